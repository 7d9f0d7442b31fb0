// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error types shared by the HTTP service and the session controllers.
//!
//! - [`ApiError`] is what axum handlers return; it renders as `{"error": msg}`.
//! - [`ClientError`] covers every failure reported by an external
//!   collaborator (custody provider, chain-data provider, price feed,
//!   verification store).
//! - [`ErrorKind`] is the closed set of user-facing error categories the
//!   auth controller surfaces in its `error` field.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

// =============================================================================
// HTTP errors
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

// =============================================================================
// Collaborator errors
// =============================================================================

/// Failure reported by (or while talking to) an external collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("oauth nonce does not match the signing context")]
    NonceMismatch,

    #[error("request signing failed: {0}")]
    Signing(String),
}

impl ClientError {
    /// Classify this failure into a user-facing category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(_) => ErrorKind::Network,
            ClientError::NonceMismatch => ErrorKind::NonceMismatch,
            ClientError::NotFound(message) if !message.contains("authenticator") => {
                ErrorKind::UserNotFound
            }
            other => ErrorKind::classify(&other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

// =============================================================================
// User-facing categories
// =============================================================================

/// Closed set of error categories shown to the user.
///
/// Provider messages are matched by substring; anything unrecognised maps to
/// [`ErrorKind::Unexpected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AuthenticatorNotFound,
    WalletSeedAlreadyImported,
    PrivateKeyAlreadyExists,
    InvalidPrivateKey,
    MissingEmail,
    MissingCredentialBundle,
    NonceMismatch,
    UserNotFound,
    Network,
    Unexpected,
}

impl ErrorKind {
    /// Map a raw provider error message to a category.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("authenticator not found") {
            ErrorKind::AuthenticatorNotFound
        } else if lower.contains("already imported this wallet seed") {
            ErrorKind::WalletSeedAlreadyImported
        } else if lower.contains("private key already exists") {
            ErrorKind::PrivateKeyAlreadyExists
        } else if lower.contains("cannot create uint8array from invalid hex string")
            || lower.contains("invalid hex string")
        {
            ErrorKind::InvalidPrivateKey
        } else if lower.contains("no user found") || lower.contains("user not found") {
            ErrorKind::UserNotFound
        } else {
            ErrorKind::Unexpected
        }
    }

    /// Message displayed to the user for this category.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticatorNotFound => "Authenticator not found",
            ErrorKind::WalletSeedAlreadyImported => "Wallet seed already imported",
            ErrorKind::PrivateKeyAlreadyExists => "Private key already exists",
            ErrorKind::InvalidPrivateKey => "Invalid private key",
            ErrorKind::MissingEmail => "An email address is required",
            ErrorKind::MissingCredentialBundle => "Missing credential bundle",
            ErrorKind::NonceMismatch => "OAuth nonce does not match this session",
            ErrorKind::UserNotFound => "No user found",
            ErrorKind::Network => "Network error, please try again",
            ErrorKind::Unexpected => "An unexpected error occurred",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.user_message())
    }
}
