// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stub collaborators shared by the end-to-end tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde_json::Value;

use embedded_wallet::chain::{AssetTransfer, ChainData, TransferQuery};
use embedded_wallet::custody::{
    CreateSubOrganization, CreatedSubOrganization, CreatedWallet, CustodyApi, EmailAuthRequest,
    EmailAuthResult, ImportedPrivateKey, NewWalletAccount, OAuthProvider, OAuthRequest, OAuthResult, PasskeyClient,
    PasskeyCredential, ProviderUser, ProxyMethod, ReadClient, SessionProvider, SigningContext,
    SubOrgFilter, WalletAccountRecord, WalletSummary,
};
use embedded_wallet::error::ClientError;
use embedded_wallet::models::{Authenticator, LoginResponse, Session, SubOrganization, User};

pub const CREATED_SUB_ORG: &str = "sub-org-new";
pub const SIGNING_PUBLIC_KEY: &str = "02abcdef";

fn unsupported(what: &str) -> ClientError {
    ClientError::Precondition(format!("{what} is not supported by this stub"))
}

// =============================================================================
// Custody
// =============================================================================

#[derive(Default)]
pub struct StubCustody {
    sub_orgs: Mutex<HashMap<String, String>>,
    email_requests: Mutex<Vec<EmailAuthRequest>>,
    wallets: Mutex<Vec<(WalletSummary, Vec<WalletAccountRecord>)>>,
}

impl StubCustody {
    pub fn email_requests(&self) -> Vec<EmailAuthRequest> {
        self.email_requests.lock().unwrap().clone()
    }

    /// Add a wallet whose accounts have the given addresses, in order.
    pub fn add_wallet(&self, organization_id: &str, wallet_id: &str, addresses: &[Address]) {
        let summary = WalletSummary {
            wallet_id: wallet_id.into(),
            wallet_name: format!("Wallet {wallet_id}"),
        };
        let accounts = addresses
            .iter()
            .enumerate()
            .map(|(i, address)| WalletAccountRecord {
                organization_id: organization_id.into(),
                wallet_id: wallet_id.into(),
                curve: "CURVE_SECP256K1".into(),
                path_format: "PATH_FORMAT_BIP32".into(),
                path: format!("m/44'/60'/0'/0/{i}"),
                address_format: "ADDRESS_FORMAT_ETHEREUM".into(),
                address: address.to_checksum(None),
            })
            .collect();
        self.wallets.lock().unwrap().push((summary, accounts));
    }
}

#[async_trait]
impl ReadClient for StubCustody {
    async fn wallets(&self, _organization_id: &str) -> Result<Vec<WalletSummary>, ClientError> {
        Ok(self
            .wallets
            .lock()
            .unwrap()
            .iter()
            .map(|(summary, _)| summary.clone())
            .collect())
    }

    async fn wallet_accounts(
        &self,
        _organization_id: &str,
        wallet_id: &str,
    ) -> Result<Vec<WalletAccountRecord>, ClientError> {
        self.wallets
            .lock()
            .unwrap()
            .iter()
            .find(|(summary, _)| summary.wallet_id == wallet_id)
            .map(|(_, accounts)| accounts.clone())
            .ok_or_else(|| ClientError::NotFound(format!("wallet {wallet_id}")))
    }
}

#[async_trait]
impl CustodyApi for StubCustody {
    async fn sub_organization_ids(&self, filter: &SubOrgFilter) -> Result<Vec<String>, ClientError> {
        Ok(self
            .sub_orgs
            .lock()
            .unwrap()
            .get(filter.filter_value())
            .cloned()
            .into_iter()
            .collect())
    }

    async fn create_sub_organization(
        &self,
        request: &CreateSubOrganization,
    ) -> Result<CreatedSubOrganization, ClientError> {
        if let Some(email) = &request.email {
            self.sub_orgs
                .lock()
                .unwrap()
                .insert(email.as_str().to_string(), CREATED_SUB_ORG.to_string());
        }
        Ok(CreatedSubOrganization {
            sub_organization_id: CREATED_SUB_ORG.into(),
            root_user_ids: vec!["user-new".into()],
            wallet: None,
        })
    }

    async fn email_auth(&self, request: &EmailAuthRequest) -> Result<EmailAuthResult, ClientError> {
        self.email_requests.lock().unwrap().push(request.clone());
        Ok(EmailAuthResult {
            user_id: "user-new".into(),
            api_key_id: "api-key-1".into(),
        })
    }

    async fn oauth(&self, _request: &OAuthRequest) -> Result<OAuthResult, ClientError> {
        Err(unsupported("oauth"))
    }

    async fn user(&self, _organization_id: &str, _user_id: &str) -> Result<ProviderUser, ClientError> {
        Err(unsupported("user"))
    }

    async fn wallet(
        &self,
        _organization_id: &str,
        wallet_id: &str,
    ) -> Result<WalletSummary, ClientError> {
        self.wallets
            .lock()
            .unwrap()
            .iter()
            .find(|(summary, _)| summary.wallet_id == wallet_id)
            .map(|(summary, _)| summary.clone())
            .ok_or_else(|| ClientError::NotFound(format!("wallet {wallet_id}")))
    }

    async fn authenticators(
        &self,
        _organization_id: &str,
        _user_id: &str,
    ) -> Result<Vec<Authenticator>, ClientError> {
        Ok(vec![])
    }

    async fn authenticator(
        &self,
        _organization_id: &str,
        authenticator_id: &str,
    ) -> Result<Authenticator, ClientError> {
        Err(ClientError::NotFound(format!("authenticator {authenticator_id}")))
    }

    async fn forward(&self, _method: ProxyMethod, _request: Value) -> Result<Value, ClientError> {
        Err(unsupported("forward"))
    }
}

// =============================================================================
// Client-side contexts
// =============================================================================

/// Signing context whose login lands in a fixed sub-organization.
pub struct StubSigning {
    organization_id: String,
    injected: Mutex<Vec<String>>,
}

impl StubSigning {
    pub fn new(organization_id: &str) -> Self {
        Self {
            organization_id: organization_id.into(),
            injected: Mutex::new(vec![]),
        }
    }

    pub fn injected(&self) -> Vec<String> {
        self.injected.lock().unwrap().clone()
    }
}

#[async_trait]
impl SigningContext for StubSigning {
    fn public_key(&self) -> Option<String> {
        Some(SIGNING_PUBLIC_KEY.into())
    }

    async fn inject_credential_bundle(&self, bundle: &str) -> Result<(), ClientError> {
        self.injected.lock().unwrap().push(bundle.to_string());
        Ok(())
    }

    async fn login(&self) -> Result<LoginResponse, ClientError> {
        if self.injected.lock().unwrap().is_empty() {
            return Err(ClientError::Unauthorized("no credential bundle injected".into()));
        }
        Ok(LoginResponse {
            organization_id: self.organization_id.clone(),
            organization_name: format!("Sub Org - {}", self.organization_id),
            user_id: "user-new".into(),
            username: "new".into(),
            session: "ro-token".into(),
            session_expiry: "1900000000".into(),
        })
    }
}

pub struct StubPasskeys;

#[async_trait]
impl PasskeyClient for StubPasskeys {
    async fn login(&self, _organization_id: Option<&str>) -> Result<LoginResponse, ClientError> {
        Err(unsupported("passkey login"))
    }

    async fn create_user_passkey(
        &self,
        _authenticator_name: &str,
        _user_name: &str,
    ) -> Result<PasskeyCredential, ClientError> {
        Err(unsupported("passkey creation"))
    }

    async fn create_read_write_session(&self, _organization_id: &str) -> Result<Session, ClientError> {
        Err(unsupported("read-write session"))
    }

    async fn create_wallet(
        &self,
        _organization_id: &str,
        _wallet_name: &str,
        _accounts: &[NewWalletAccount],
    ) -> Result<CreatedWallet, ClientError> {
        Err(unsupported("wallet creation"))
    }

    async fn create_wallet_accounts(
        &self,
        _organization_id: &str,
        _wallet_id: &str,
        _accounts: &[NewWalletAccount],
    ) -> Result<Vec<String>, ClientError> {
        Err(unsupported("account creation"))
    }

    async fn create_authenticator(
        &self,
        _organization_id: &str,
        _user_id: &str,
        _authenticator_name: &str,
        _credential: &PasskeyCredential,
    ) -> Result<String, ClientError> {
        Err(unsupported("authenticator creation"))
    }

    async fn delete_authenticators(
        &self,
        _organization_id: &str,
        _user_id: &str,
        _authenticator_ids: &[String],
    ) -> Result<(), ClientError> {
        Err(unsupported("authenticator removal"))
    }

    async fn init_import_wallet(
        &self,
        _organization_id: &str,
        _user_id: &str,
    ) -> Result<String, ClientError> {
        Err(unsupported("wallet import"))
    }

    async fn import_wallet(
        &self,
        _organization_id: &str,
        _user_id: &str,
        _wallet_name: &str,
        _encrypted_bundle: &str,
        _accounts: &[NewWalletAccount],
    ) -> Result<CreatedWallet, ClientError> {
        Err(unsupported("wallet import"))
    }

    async fn init_import_private_key(
        &self,
        _organization_id: &str,
        _user_id: &str,
    ) -> Result<String, ClientError> {
        Err(unsupported("private key import"))
    }

    async fn import_private_key(
        &self,
        _organization_id: &str,
        _user_id: &str,
        _private_key_name: &str,
        _encrypted_bundle: &str,
    ) -> Result<ImportedPrivateKey, ClientError> {
        Err(unsupported("private key import"))
    }

    async fn sign_transaction(
        &self,
        _organization_id: &str,
        _sign_with: Address,
        _unsigned_transaction: &str,
    ) -> Result<String, ClientError> {
        Err(unsupported("transaction signing"))
    }
}

/// No read-only session: wallet listings go through the custody API.
pub struct NoSession;

#[async_trait]
impl SessionProvider for NoSession {
    async fn read_client(&self) -> Option<Arc<dyn ReadClient>> {
        None
    }

    async fn logout(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

pub struct NoOAuth;

#[async_trait]
impl OAuthProvider for NoOAuth {
    async fn logout(&self) {}
}

// =============================================================================
// Chain
// =============================================================================

/// Chain stub that records which addresses had their balance fetched.
#[derive(Default)]
pub struct CountingChain {
    balance_calls: Mutex<Vec<Address>>,
}

impl CountingChain {
    pub fn balance_calls(&self) -> Vec<Address> {
        self.balance_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainData for CountingChain {
    async fn balance(&self, address: Address) -> Result<U256, ClientError> {
        self.balance_calls.lock().unwrap().push(address);
        Ok(U256::from(1_000_000_000_000_000_000u128))
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        Ok(1)
    }

    async fn asset_transfers(&self, _query: &TransferQuery) -> Result<Vec<AssetTransfer>, ClientError> {
        Ok(vec![])
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn user(organization_id: &str) -> User {
    User {
        user_id: "user-1".into(),
        username: "alice".into(),
        email: None,
        organization: SubOrganization {
            organization_id: organization_id.into(),
            organization_name: format!("Sub Org - {organization_id}"),
        },
        read_only_session: Session {
            token: "ro-token".into(),
            expiry: 1_900_000_000,
        },
        read_write_session: None,
    }
}
