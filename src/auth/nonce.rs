// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth nonce binding.
//!
//! The identity provider is asked to embed `sha256_hex(public_key)` as the
//! ID token's `nonce`, where `public_key` is the signing context's ephemeral
//! key. A token minted for another session therefore fails the check.
//!
//! The token signature is verified by the custody provider during the
//! credential exchange; here only the payload is read.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::ClientError;

/// Nonce expected in ID tokens issued for `public_key`.
pub fn oauth_nonce(public_key: &str) -> String {
    alloy::hex::encode(Sha256::digest(public_key.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
}

/// Decode the (unverified) payload segment of a JWT.
pub fn id_token_claims(id_token: &str) -> Result<IdTokenClaims, ClientError> {
    let mut segments = id_token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
        _ => return Err(ClientError::Decode("ID token is not a JWT".into())),
    };

    let bytes = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('='))
        .map_err(|e| ClientError::Decode(format!("ID token payload: {e}")))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Claims of `id_token`, provided its nonce was derived from `public_key`.
pub fn verify_nonce(id_token: &str, public_key: &str) -> Result<IdTokenClaims, ClientError> {
    let claims = id_token_claims(id_token)?;
    match &claims.nonce {
        Some(nonce) if *nonce == oauth_nonce(public_key) => Ok(claims),
        _ => Err(ClientError::NonceMismatch),
    }
}
