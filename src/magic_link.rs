// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Magic-link URLs.
//!
//! Links have the shape
//! `{base}/email-{action}?userEmail={email}&continueWith={method}&credentialBundle=%s`.
//! The custody provider substitutes `%s` with the encrypted credential bundle
//! when it sends the email; the landing page hands the full URL back to
//! [`MagicLinkParams::parse`].

use std::fmt;
use std::str::FromStr;

use url::{form_urlencoded, Url};

use crate::models::Email;

/// Substitution point the provider replaces with the bundle.
pub const CREDENTIAL_BUNDLE_PLACEHOLDER: &str = "%s";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicLinkAction {
    Auth,
    Verification,
}

impl MagicLinkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MagicLinkAction::Auth => "auth",
            MagicLinkAction::Verification => "verification",
        }
    }

    fn path_segment(&self) -> String {
        format!("email-{}", self.as_str())
    }
}

/// How the user continues after the link has been opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueWith {
    Email,
    Passkey,
}

impl ContinueWith {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContinueWith::Email => "email",
            ContinueWith::Passkey => "passkey",
        }
    }
}

impl fmt::Display for ContinueWith {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContinueWith {
    type Err = MagicLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(ContinueWith::Email),
            "passkey" => Ok(ContinueWith::Passkey),
            other => Err(MagicLinkError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MagicLinkError {
    #[error("`{0}` is not a magic-link landing path")]
    UnknownAction(String),

    #[error("unknown continueWith value `{0}`")]
    UnknownMethod(String),
}

/// Build the template sent to the provider for `email`.
pub fn template(
    base_url: &Url,
    action: MagicLinkAction,
    email: &Email,
    continue_with: ContinueWith,
) -> String {
    let email: String = form_urlencoded::byte_serialize(email.as_str().as_bytes()).collect();
    format!(
        "{}/{}?userEmail={}&continueWith={}&credentialBundle={}",
        base_url.as_str().trim_end_matches('/'),
        action.path_segment(),
        email,
        continue_with,
        CREDENTIAL_BUNDLE_PLACEHOLDER,
    )
}

/// Query parameters of an opened magic link.
///
/// Every field is optional here; the controllers decide which combinations
/// are actionable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicLinkParams {
    pub action: MagicLinkAction,
    pub user_email: Option<String>,
    pub continue_with: Option<ContinueWith>,
    pub credential_bundle: Option<String>,
}

impl MagicLinkParams {
    pub fn parse(url: &Url) -> Result<Self, MagicLinkError> {
        let last_segment = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default();
        let action = match last_segment {
            "email-auth" => MagicLinkAction::Auth,
            "email-verification" => MagicLinkAction::Verification,
            other => return Err(MagicLinkError::UnknownAction(other.to_string())),
        };

        let mut params = Self {
            action,
            user_email: None,
            continue_with: None,
            credential_bundle: None,
        };

        for (key, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                // A literal `+` in an unencoded address decodes to a space.
                "userEmail" => params.user_email = Some(value.replace(' ', "+")),
                "continueWith" => params.continue_with = Some(value.parse()?),
                "credentialBundle" if value != CREDENTIAL_BUNDLE_PLACEHOLDER => {
                    params.credential_bundle = Some(value.to_string())
                }
                _ => {}
            }
        }

        Ok(params)
    }

    /// The email parameter, validated.
    pub fn email(&self) -> Option<Email> {
        self.user_email
            .as_deref()
            .and_then(|raw| Email::parse(raw).ok())
    }
}
