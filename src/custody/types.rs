// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request and response shapes exchanged with the custody provider.

use std::str::FromStr;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ClientError;
use crate::models::{Account, Authenticator, Email, Wallet};

pub const CURVE_SECP256K1: &str = "CURVE_SECP256K1";
pub const PATH_FORMAT_BIP32: &str = "PATH_FORMAT_BIP32";
pub const ADDRESS_FORMAT_ETHEREUM: &str = "ADDRESS_FORMAT_ETHEREUM";

pub const DEFAULT_WALLET_NAME: &str = "Default Wallet";
pub const PASSKEY_AUTHENTICATOR_NAME: &str = "Passkey";
pub const OAUTH_PROVIDER_NAME: &str = "Google Auth - Embedded Wallet";

// =============================================================================
// Sub-organizations
// =============================================================================

/// Lookup key for sub-organizations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubOrgFilter {
    Email(Email),
    PublicKey(String),
    Username(String),
    OidcToken(String),
}

impl SubOrgFilter {
    pub fn filter_type(&self) -> &'static str {
        match self {
            SubOrgFilter::Email(_) => "EMAIL",
            SubOrgFilter::PublicKey(_) => "PUBLIC_KEY",
            SubOrgFilter::Username(_) => "USERNAME",
            SubOrgFilter::OidcToken(_) => "OIDC_TOKEN",
        }
    }

    pub fn filter_value(&self) -> &str {
        match self {
            SubOrgFilter::Email(email) => email.as_str(),
            SubOrgFilter::PublicKey(v) | SubOrgFilter::Username(v) | SubOrgFilter::OidcToken(v) => {
                v
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub credential_id: String,
    pub client_data_json: String,
    pub attestation_object: String,
    #[serde(default)]
    pub transports: Vec<String>,
}

/// Output of a WebAuthn registration ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasskeyCredential {
    pub encoded_challenge: String,
    pub attestation: Attestation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredential {
    pub provider_name: String,
    pub oidc_token: String,
}

impl OAuthCredential {
    pub fn google(oidc_token: impl Into<String>) -> Self {
        Self {
            provider_name: OAUTH_PROVIDER_NAME.to_string(),
            oidc_token: oidc_token.into(),
        }
    }
}

/// Everything needed to create a user's sub-organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSubOrganization {
    pub email: Option<Email>,
    pub passkey: Option<PasskeyCredential>,
    pub oauth: Option<OAuthCredential>,
}

impl CreateSubOrganization {
    pub fn organization_name(&self) -> String {
        match &self.email {
            Some(email) => format!("Sub Org - {email}"),
            None => format!("Sub Org - {}", uuid::Uuid::new_v4()),
        }
    }

    fn root_user_name(&self) -> String {
        self.email
            .as_ref()
            .map(|e| e.local_part().to_string())
            .unwrap_or_else(|| "User".to_string())
    }

    /// Activity parameters: one root user, quorum 1, a default wallet.
    pub fn parameters(&self) -> Value {
        let authenticators: Vec<Value> = self
            .passkey
            .iter()
            .map(|passkey| {
                json!({
                    "authenticatorName": PASSKEY_AUTHENTICATOR_NAME,
                    "challenge": passkey.encoded_challenge,
                    "attestation": passkey.attestation,
                })
            })
            .collect();

        let oauth_providers: Vec<Value> = self
            .oauth
            .iter()
            .map(|oauth| {
                json!({
                    "providerName": oauth.provider_name,
                    "oidcToken": oauth.oidc_token,
                })
            })
            .collect();

        let mut root_user = json!({
            "userName": self.root_user_name(),
            "apiKeys": [],
            "authenticators": authenticators,
            "oauthProviders": oauth_providers,
        });
        if let Some(email) = &self.email {
            root_user["userEmail"] = json!(email.as_str());
        }

        json!({
            "subOrganizationName": self.organization_name(),
            "rootUsers": [root_user],
            "rootQuorumThreshold": 1,
            "wallet": {
                "walletName": DEFAULT_WALLET_NAME,
                "accounts": [default_ethereum_account_at_index(0)],
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSubOrganization {
    pub sub_organization_id: String,
    #[serde(default)]
    pub root_user_ids: Vec<String>,
    #[serde(default)]
    pub wallet: Option<CreatedWallet>,
}

// =============================================================================
// Credential exchange
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAuthRequest {
    pub email: Email,
    pub target_public_key: String,
    pub organization_id: String,
    pub magic_link_template: String,
}

impl EmailAuthRequest {
    pub fn parameters(&self) -> Value {
        json!({
            "email": self.email.as_str(),
            "targetPublicKey": self.target_public_key,
            "emailCustomization": { "magicLinkTemplate": self.magic_link_template },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAuthResult {
    pub user_id: String,
    pub api_key_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthRequest {
    pub oidc_token: String,
    pub target_public_key: String,
    pub organization_id: String,
}

impl OAuthRequest {
    pub fn parameters(&self) -> Value {
        json!({
            "oidcToken": self.oidc_token,
            "targetPublicKey": self.target_public_key,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthResult {
    pub user_id: String,
    pub api_key_id: String,
    pub credential_bundle: String,
}

// =============================================================================
// Wallets & accounts
// =============================================================================

/// Account derivation parameters for wallet/account creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWalletAccount {
    pub curve: String,
    pub path_format: String,
    pub path: String,
    pub address_format: String,
}

/// `m/44'/60'/0'/0/{index}` on secp256k1, Ethereum address format.
pub fn default_ethereum_account_at_index(index: usize) -> NewWalletAccount {
    NewWalletAccount {
        curve: CURVE_SECP256K1.to_string(),
        path_format: PATH_FORMAT_BIP32.to_string(),
        path: format!("m/44'/60'/0'/0/{index}"),
        address_format: ADDRESS_FORMAT_ETHEREUM.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedWallet {
    pub wallet_id: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// Key created by a private-key import. It is not a wallet and is not listed
/// with the user's wallets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedPrivateKey {
    pub private_key_id: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub wallet_id: String,
    pub wallet_name: String,
}

impl WalletSummary {
    pub fn with_accounts(self, accounts: Vec<Account>) -> Wallet {
        Wallet {
            wallet_id: self.wallet_id,
            wallet_name: self.wallet_name,
            accounts,
        }
    }
}

/// Wallet account as listed by the provider, before address validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccountRecord {
    pub organization_id: String,
    pub wallet_id: String,
    pub curve: String,
    pub path_format: String,
    pub path: String,
    pub address_format: String,
    pub address: String,
}

impl WalletAccountRecord {
    /// Validate the address; the balance is left unfetched.
    pub fn into_account(self) -> Result<Account, ClientError> {
        let address = Address::from_str(&self.address)
            .map_err(|e| ClientError::Decode(format!("account address {}: {e}", self.address)))?;
        Ok(Account {
            address,
            organization_id: self.organization_id,
            wallet_id: self.wallet_id,
            curve: self.curve,
            path: self.path,
            path_format: self.path_format,
            address_format: self.address_format,
            balance: None,
        })
    }
}

// =============================================================================
// Users & authenticators
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUser {
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderTimestamp {
    seconds: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorRecord {
    authenticator_id: String,
    authenticator_name: String,
    #[serde(default)]
    created_at: Option<ProviderTimestamp>,
}

impl From<AuthenticatorRecord> for Authenticator {
    fn from(record: AuthenticatorRecord) -> Self {
        let created_at = record
            .created_at
            .and_then(|ts| ts.seconds.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        Authenticator {
            authenticator_id: record.authenticator_id,
            authenticator_name: record.authenticator_name,
            created_at,
        }
    }
}
