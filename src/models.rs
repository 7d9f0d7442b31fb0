// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Entities shared by the controllers, the collaborator clients and the
//! HTTP service.
//!
//! ## Validation
//!
//! Shapes coming back from collaborators are validated once, where they
//! enter the crate: emails are normalised by [`Email::parse`], addresses
//! are parsed into [`Address`], and provider login responses are mapped to a
//! [`User`] through `TryFrom<LoginResponse>`.
//!
//! ## Model Categories
//!
//! - **Identity**: [`Email`], [`User`], [`SubOrganization`], [`Session`]
//! - **Wallets**: [`Wallet`], [`Account`]
//! - **Activity**: [`Transaction`], [`TxStatus`]
//! - **Verification store**: [`UserRecord`]
//! - **Local preferences**: [`PreferredWallet`]

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;

use crate::error::ClientError;

// =============================================================================
// Email
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmailError {
    #[error("email address is empty")]
    Empty,

    #[error("`{0}` is not a valid email address")]
    Invalid(String),
}

/// Normalised email address (NFKC, trimmed, lower-cased).
///
/// Used as the primary key of the verification store, so two spellings that
/// normalise to the same string always address the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let normalized: String = raw.nfkc().collect::<String>().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(EmailError::Empty);
        }

        let valid = match normalized.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !normalized.chars().any(char::is_whitespace)
            }
            None => false,
        };

        if valid {
            Ok(Self(normalized))
        } else {
            Err(EmailError::Invalid(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part before the `@`; used as the root user name of new sub-organizations.
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Email::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

// =============================================================================
// Identity
// =============================================================================

/// The per-user tenant created by the custody provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubOrganization {
    pub organization_id: String,
    pub organization_name: String,
}

/// Opaque session token plus its expiry (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub expiry: i64,
}

impl Session {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expiry, 0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now.timestamp()
    }
}

/// The authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: Option<Email>,
    pub organization: SubOrganization,
    pub read_only_session: Session,
    pub read_write_session: Option<Session>,
}

/// Login result as returned by the signing contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub organization_id: String,
    pub organization_name: String,
    pub user_id: String,
    pub username: String,
    pub session: String,
    #[serde(deserialize_with = "string_or_number")]
    pub session_expiry: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

impl TryFrom<LoginResponse> for User {
    type Error = ClientError;

    fn try_from(response: LoginResponse) -> Result<Self, Self::Error> {
        if response.organization_id.is_empty() {
            return Err(ClientError::Decode(
                "login response carries no organization id".into(),
            ));
        }
        let expiry = response.session_expiry.trim().parse::<i64>().map_err(|_| {
            ClientError::Decode(format!(
                "session expiry `{}` is not a timestamp",
                response.session_expiry
            ))
        })?;

        Ok(User {
            user_id: response.user_id,
            username: response.username,
            email: None,
            organization: SubOrganization {
                organization_id: response.organization_id,
                organization_name: response.organization_name,
            },
            read_only_session: Session {
                token: response.session,
                expiry,
            },
            read_write_session: None,
        })
    }
}

// =============================================================================
// Wallets
// =============================================================================

/// A derived account inside a wallet.
///
/// `balance` stays `None` until the account is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: Address,
    pub organization_id: String,
    pub wallet_id: String,
    pub curve: String,
    pub path: String,
    pub path_format: String,
    pub address_format: String,
    pub balance: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub wallet_id: String,
    pub wallet_name: String,
    pub accounts: Vec<Account>,
}

/// Registered WebAuthn credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticator {
    pub authenticator_id: String,
    pub authenticator_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Activity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Sent,
    Received,
    Failed,
}

/// A transfer touching one of the user's addresses. `hash` is the identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub block_number: u64,
    pub value: Option<f64>,
    pub from: Address,
    pub to: Option<Address>,
    pub status: TxStatus,
    pub timestamp: Option<DateTime<Utc>>,
}

// =============================================================================
// Verification store
// =============================================================================

/// Row of the Email Verification Store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Normalised email address (primary key).
    #[schema(value_type = String, example = "new@example.com")]
    pub email: Email,
    /// Sub-organization created for this email.
    pub sub_organization_id: String,
    /// Flips to `true` once, after the verification magic link is used.
    pub email_verified: bool,
}

/// Request body for `/add-user`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddUserRequest {
    pub email: Option<String>,
    pub sub_organization_id: Option<String>,
}

/// Request body for `/find-user-by-email` and `/verify-user-email`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: Option<String>,
}

/// Envelope returned by the verification store endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRecord>,
}

// =============================================================================
// Local preferences
// =============================================================================

/// The wallet a user last selected, persisted across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredWallet {
    pub user_id: String,
    pub wallet_id: String,
}
