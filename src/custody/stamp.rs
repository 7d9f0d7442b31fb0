// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API-key request stamping.
//!
//! Every request to the custody provider carries an `X-Stamp` header: the
//! unpadded base64url encoding of
//! `{"publicKey": <compressed P-256 key, hex>, "scheme": "SIGNATURE_SCHEME_TK_API_P256", "signature": <DER ECDSA/SHA-256, hex>}`
//! where the signature covers the exact request body bytes.

use alloy::hex;
use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};
use serde::Serialize;

use crate::error::ClientError;

pub const STAMP_HEADER: &str = "X-Stamp";
pub const STAMP_SCHEME: &str = "SIGNATURE_SCHEME_TK_API_P256";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stamp<'a> {
    public_key: &'a str,
    scheme: &'a str,
    signature: String,
}

pub struct ApiKeyStamper {
    key_pair: EcdsaKeyPair,
    public_key: String,
    rng: SystemRandom,
}

impl std::fmt::Debug for ApiKeyStamper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyStamper")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl ApiKeyStamper {
    /// Load a PKCS#8 `PRIVATE KEY` PEM.
    ///
    /// When `expected_public_key` is given it must match the derived key.
    pub fn from_pem(pem_str: &str, expected_public_key: Option<&str>) -> Result<Self, ClientError> {
        let parsed = pem::parse(pem_str.trim())
            .map_err(|e| ClientError::Signing(format!("invalid PEM: {e}")))?;
        if parsed.tag() != "PRIVATE KEY" {
            return Err(ClientError::Signing(format!(
                "expected a PKCS#8 PRIVATE KEY, got {}",
                parsed.tag()
            )));
        }

        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, parsed.contents(), &rng)
                .map_err(|e| ClientError::Signing(format!("rejected P-256 key: {e}")))?;

        let public_key = compress_public_key(key_pair.public_key().as_ref())?;
        if let Some(expected) = expected_public_key {
            if !expected.trim().eq_ignore_ascii_case(&public_key) {
                return Err(ClientError::Signing(
                    "API_PUBLIC_KEY does not match API_PRIVATE_KEY".into(),
                ));
            }
        }

        Ok(Self {
            key_pair,
            public_key,
            rng,
        })
    }

    /// Compressed public key, hex encoded.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Stamp value for the given request body.
    pub fn stamp(&self, body: &[u8]) -> Result<String, ClientError> {
        let signature = self
            .key_pair
            .sign(&self.rng, body)
            .map_err(|_| ClientError::Signing("ECDSA signing failed".into()))?;

        let stamp = Stamp {
            public_key: &self.public_key,
            scheme: STAMP_SCHEME,
            signature: hex::encode(signature.as_ref()),
        };
        let json = serde_json::to_vec(&stamp)?;
        Ok(Base64UrlUnpadded::encode_string(&json))
    }
}

/// SEC1 uncompressed (`04 || x || y`) to compressed (`02|03 || x`).
fn compress_public_key(uncompressed: &[u8]) -> Result<String, ClientError> {
    if uncompressed.len() != 65 || uncompressed[0] != 0x04 {
        return Err(ClientError::Signing("unexpected public key encoding".into()));
    }
    let prefix = if uncompressed[64] & 1 == 0 { 0x02 } else { 0x03 };
    let mut compressed = Vec::with_capacity(33);
    compressed.push(prefix);
    compressed.extend_from_slice(&uncompressed[1..33]);
    Ok(hex::encode(compressed))
}
