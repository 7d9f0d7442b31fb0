// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory collaborators for controller tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::consensus::TxEip1559;
use alloy::primitives::{keccak256, Address, TxKind, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::auth::{AuthController, AuthDeps, AuthState, AuthenticatorManager};
use crate::chain::{AssetTransfer, ChainData, TransferDirection, TransferQuery};
use crate::custody::{
    Attestation, CreateSubOrganization, CreatedSubOrganization, CreatedWallet, CustodyApi,
    EmailAuthRequest, EmailAuthResult, ImportFrame, ImportedPrivateKey, NewWalletAccount,
    OAuthProvider, OAuthRequest, OAuthResult, PasskeyClient, PasskeyCredential, ProviderUser, ProxyMethod, ReadClient, SessionProvider,
    SigningContext, SubOrgFilter, WalletAccountRecord, WalletSummary, ADDRESS_FORMAT_ETHEREUM,
    CURVE_SECP256K1, PATH_FORMAT_BIP32,
};
use crate::directory::UserDirectory;
use crate::error::ClientError;
use crate::models::{
    Account, Authenticator, Email, LoginResponse, Session, SubOrganization, User, UserRecord,
    Wallet,
};
use crate::storage::PreferenceStore;
use crate::transactions::TransactionSync;
use crate::wallets::{WalletDeps, WalletSync};

pub(crate) const TEST_PUBLIC_KEY: &str =
    "02a1633cafcc01ebfb6d78e39f687a1f0995c62fc95f51ead10a02ee0be551b5dc";
pub(crate) const NEW_SUB_ORG: &str = "sub-new";

pub(crate) fn test_user() -> User {
    User {
        user_id: "user-1".into(),
        username: "new".into(),
        email: None,
        organization: SubOrganization {
            organization_id: NEW_SUB_ORG.into(),
            organization_name: "Sub Org - new@example.com".into(),
        },
        read_only_session: Session {
            token: "ro-token".into(),
            expiry: 1_900_000_000,
        },
        read_write_session: None,
    }
}

fn login_response(organization_id: &str) -> LoginResponse {
    LoginResponse {
        organization_id: organization_id.into(),
        organization_name: "Sub Org - new@example.com".into(),
        user_id: "user-1".into(),
        username: "new".into(),
        session: "ro-token".into(),
        session_expiry: "1900000000".into(),
    }
}

pub(crate) fn account(wallet_id: &str, byte: u8, index: usize) -> Account {
    Account {
        address: Address::repeat_byte(byte),
        organization_id: NEW_SUB_ORG.into(),
        wallet_id: wallet_id.into(),
        curve: CURVE_SECP256K1.into(),
        path: format!("m/44'/60'/0'/0/{index}"),
        path_format: PATH_FORMAT_BIP32.into(),
        address_format: ADDRESS_FORMAT_ETHEREUM.into(),
        balance: None,
    }
}

/// Wallet whose accounts have addresses `repeat_byte(b)` for each `b`.
pub(crate) fn wallet(wallet_id: &str, bytes: &[u8]) -> Wallet {
    Wallet {
        wallet_id: wallet_id.into(),
        wallet_name: format!("Wallet {wallet_id}"),
        accounts: bytes
            .iter()
            .enumerate()
            .map(|(i, b)| account(wallet_id, *b, i))
            .collect(),
    }
}

// =============================================================================
// Custody
// =============================================================================

pub(crate) struct FakeCustody {
    sub_orgs: Mutex<HashMap<String, String>>,
    created_sub_orgs: AtomicUsize,
    email_auth: Mutex<Vec<EmailAuthRequest>>,
    fail_email_auth: AtomicBool,
    oauth_calls: AtomicUsize,
    wallets: Mutex<Vec<Wallet>>,
    wallet_listings: AtomicUsize,
    authenticators: Mutex<Vec<Authenticator>>,
    observer: Mutex<Option<watch::Receiver<AuthState>>>,
    observed: Mutex<Vec<AuthState>>,
}

impl FakeCustody {
    pub(crate) fn new() -> Self {
        Self {
            sub_orgs: Mutex::new(HashMap::new()),
            created_sub_orgs: AtomicUsize::new(0),
            email_auth: Mutex::new(vec![]),
            fail_email_auth: AtomicBool::new(false),
            oauth_calls: AtomicUsize::new(0),
            wallets: Mutex::new(vec![]),
            wallet_listings: AtomicUsize::new(0),
            authenticators: Mutex::new(vec![Authenticator {
                authenticator_id: "auth-1".into(),
                authenticator_name: "Passkey".into(),
                created_at: None,
            }]),
            observer: Mutex::new(None),
            observed: Mutex::new(vec![]),
        }
    }

    pub(crate) fn seed_sub_org(&self, filter_value: &str, organization_id: &str) {
        self.sub_orgs
            .lock()
            .unwrap()
            .insert(filter_value.into(), organization_id.into());
    }

    pub(crate) fn created_sub_orgs(&self) -> usize {
        self.created_sub_orgs.load(Ordering::SeqCst)
    }

    pub(crate) fn email_auth_requests(&self) -> Vec<EmailAuthRequest> {
        self.email_auth.lock().unwrap().clone()
    }

    pub(crate) fn fail_next_email_auth(&self) {
        self.fail_email_auth.store(true, Ordering::SeqCst);
    }

    pub(crate) fn oauth_calls(&self) -> usize {
        self.oauth_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_wallets(&self, wallets: Vec<Wallet>) {
        *self.wallets.lock().unwrap() = wallets;
    }

    pub(crate) fn wallet_listings(&self) -> usize {
        self.wallet_listings.load(Ordering::SeqCst)
    }

    /// Snapshot the auth state whenever `email_auth` is called.
    pub(crate) fn observe(&self, rx: watch::Receiver<AuthState>) {
        *self.observer.lock().unwrap() = Some(rx);
    }

    pub(crate) fn observed(&self) -> Vec<AuthState> {
        self.observed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReadClient for FakeCustody {
    async fn wallets(&self, _: &str) -> Result<Vec<WalletSummary>, ClientError> {
        self.wallet_listings.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .wallets
            .lock()
            .unwrap()
            .iter()
            .map(|w| WalletSummary {
                wallet_id: w.wallet_id.clone(),
                wallet_name: w.wallet_name.clone(),
            })
            .collect())
    }

    async fn wallet_accounts(
        &self,
        _: &str,
        wallet_id: &str,
    ) -> Result<Vec<WalletAccountRecord>, ClientError> {
        let wallets = self.wallets.lock().unwrap();
        let wallet = wallets
            .iter()
            .find(|w| w.wallet_id == wallet_id)
            .ok_or_else(|| ClientError::NotFound(format!("wallet {wallet_id}")))?;
        Ok(wallet
            .accounts
            .iter()
            .map(|a| WalletAccountRecord {
                organization_id: a.organization_id.clone(),
                wallet_id: a.wallet_id.clone(),
                curve: a.curve.clone(),
                path_format: a.path_format.clone(),
                path: a.path.clone(),
                address_format: a.address_format.clone(),
                address: a.address.to_checksum(None),
            })
            .collect())
    }
}

#[async_trait]
impl CustodyApi for FakeCustody {
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
        self.created_sub_orgs.fetch_add(1, Ordering::SeqCst);
        if let Some(email) = &request.email {
            self.seed_sub_org(email.as_str(), NEW_SUB_ORG);
        }
        if let Some(oauth) = &request.oauth {
            self.seed_sub_org(&oauth.oidc_token, NEW_SUB_ORG);
        }
        Ok(CreatedSubOrganization {
            sub_organization_id: NEW_SUB_ORG.into(),
            root_user_ids: vec!["user-1".into()],
            wallet: None,
        })
    }

    async fn email_auth(&self, request: &EmailAuthRequest) -> Result<EmailAuthResult, ClientError> {
        if let Some(rx) = self.observer.lock().unwrap().as_ref() {
            self.observed.lock().unwrap().push(rx.borrow().clone());
        }
        if self.fail_email_auth.swap(false, Ordering::SeqCst) {
            return Err(ClientError::Transport("connection reset".into()));
        }
        self.email_auth.lock().unwrap().push(request.clone());
        Ok(EmailAuthResult {
            user_id: "user-1".into(),
            api_key_id: "key-1".into(),
        })
    }

    async fn oauth(&self, _: &OAuthRequest) -> Result<OAuthResult, ClientError> {
        self.oauth_calls.fetch_add(1, Ordering::SeqCst);
        Ok(OAuthResult {
            user_id: "user-1".into(),
            api_key_id: "key-2".into(),
            credential_bundle: "oauth-bundle".into(),
        })
    }

    async fn user(&self, _: &str, user_id: &str) -> Result<ProviderUser, ClientError> {
        Ok(ProviderUser {
            user_id: user_id.into(),
            user_name: "new".into(),
            user_email: Some("new@example.com".into()),
        })
    }

    async fn wallet(&self, _: &str, wallet_id: &str) -> Result<WalletSummary, ClientError> {
        self.wallets
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.wallet_id == wallet_id)
            .map(|w| WalletSummary {
                wallet_id: w.wallet_id.clone(),
                wallet_name: w.wallet_name.clone(),
            })
            .ok_or_else(|| ClientError::NotFound(format!("wallet {wallet_id}")))
    }

    async fn authenticators(&self, _: &str, _: &str) -> Result<Vec<Authenticator>, ClientError> {
        Ok(self.authenticators.lock().unwrap().clone())
    }

    async fn authenticator(&self, _: &str, authenticator_id: &str) -> Result<Authenticator, ClientError> {
        self.authenticators
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.authenticator_id == authenticator_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("authenticator not found: {authenticator_id}")))
    }

    async fn forward(&self, method: ProxyMethod, request: Value) -> Result<Value, ClientError> {
        Ok(json!({ "method": method.as_str(), "request": request }))
    }
}

// =============================================================================
// Client-side contexts
// =============================================================================

pub(crate) struct FakeSigning {
    injected: Mutex<Vec<String>>,
}

impl FakeSigning {
    pub(crate) fn injected(&self) -> Vec<String> {
        self.injected.lock().unwrap().clone()
    }
}

#[async_trait]
impl SigningContext for FakeSigning {
    fn public_key(&self) -> Option<String> {
        Some(TEST_PUBLIC_KEY.into())
    }

    async fn inject_credential_bundle(&self, bundle: &str) -> Result<(), ClientError> {
        self.injected.lock().unwrap().push(bundle.into());
        Ok(())
    }

    async fn login(&self) -> Result<LoginResponse, ClientError> {
        Ok(login_response(NEW_SUB_ORG))
    }
}

pub(crate) struct FakePasskeys {
    custody: Arc<FakeCustody>,
    login_calls: AtomicUsize,
    login_error: Mutex<Option<String>>,
    created_passkeys: AtomicUsize,
    created_wallets: AtomicUsize,
    next_address: AtomicU8,
    imported_seeds: Mutex<Vec<String>>,
    imported_keys: Mutex<Vec<String>>,
    signed: Mutex<Vec<(Address, String)>>,
}

impl FakePasskeys {
    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_login(&self, message: &str) {
        *self.login_error.lock().unwrap() = Some(message.into());
    }

    pub(crate) fn created_passkeys(&self) -> usize {
        self.created_passkeys.load(Ordering::SeqCst)
    }

    pub(crate) fn created_wallets(&self) -> usize {
        self.created_wallets.load(Ordering::SeqCst)
    }

    /// `(sign_with, unsigned payload)` per signing request.
    pub(crate) fn signed_transactions(&self) -> Vec<(Address, String)> {
        self.signed.lock().unwrap().clone()
    }

    fn fresh_addresses(&self, count: usize) -> Vec<String> {
        (0..count)
            .map(|_| {
                let byte = self.next_address.fetch_add(1, Ordering::SeqCst);
                Address::repeat_byte(byte).to_checksum(None)
            })
            .collect()
    }
}

#[async_trait]
impl PasskeyClient for FakePasskeys {
    async fn login(&self, organization_id: Option<&str>) -> Result<LoginResponse, ClientError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.login_error.lock().unwrap().clone() {
            return Err(ClientError::Remote {
                status: 400,
                message,
            });
        }
        Ok(login_response(organization_id.unwrap_or(NEW_SUB_ORG)))
    }

    async fn create_user_passkey(&self, _: &str, _: &str) -> Result<PasskeyCredential, ClientError> {
        self.created_passkeys.fetch_add(1, Ordering::SeqCst);
        Ok(PasskeyCredential {
            encoded_challenge: "challenge".into(),
            attestation: Attestation {
                credential_id: "credential".into(),
                client_data_json: "client-data".into(),
                attestation_object: "attestation".into(),
                transports: vec!["AUTHENTICATOR_TRANSPORT_HYBRID".into()],
            },
        })
    }

    async fn create_read_write_session(&self, _: &str) -> Result<Session, ClientError> {
        Ok(Session {
            token: "rw-token".into(),
            expiry: 1_900_000_900,
        })
    }

    async fn create_wallet(
        &self,
        _: &str,
        _: &str,
        accounts: &[NewWalletAccount],
    ) -> Result<CreatedWallet, ClientError> {
        let n = self.created_wallets.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedWallet {
            wallet_id: format!("w-new-{n}"),
            addresses: self.fresh_addresses(accounts.len()),
        })
    }

    async fn create_wallet_accounts(
        &self,
        _: &str,
        _: &str,
        accounts: &[NewWalletAccount],
    ) -> Result<Vec<String>, ClientError> {
        Ok(self.fresh_addresses(accounts.len()))
    }

    async fn create_authenticator(
        &self,
        _: &str,
        _: &str,
        name: &str,
        _: &PasskeyCredential,
    ) -> Result<String, ClientError> {
        let mut authenticators = self.custody.authenticators.lock().unwrap();
        let id = format!("auth-{}", authenticators.len() + 1);
        authenticators.push(Authenticator {
            authenticator_id: id.clone(),
            authenticator_name: name.into(),
            created_at: None,
        });
        Ok(id)
    }

    async fn delete_authenticators(
        &self,
        _: &str,
        _: &str,
        ids: &[String],
    ) -> Result<(), ClientError> {
        self.custody
            .authenticators
            .lock()
            .unwrap()
            .retain(|a| !ids.contains(&a.authenticator_id));
        Ok(())
    }

    async fn init_import_wallet(&self, _: &str, user_id: &str) -> Result<String, ClientError> {
        Ok(format!("wallet-import-bundle-{user_id}"))
    }

    async fn import_wallet(
        &self,
        _: &str,
        _: &str,
        _: &str,
        encrypted_bundle: &str,
        accounts: &[NewWalletAccount],
    ) -> Result<CreatedWallet, ClientError> {
        {
            let mut seeds = self.imported_seeds.lock().unwrap();
            if seeds.iter().any(|s| s == encrypted_bundle) {
                return Err(ClientError::Remote {
                    status: 400,
                    message: "You have already imported this wallet seed".into(),
                });
            }
            seeds.push(encrypted_bundle.into());
        }
        let n = self.created_wallets.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedWallet {
            wallet_id: format!("w-imported-{n}"),
            addresses: self.fresh_addresses(accounts.len()),
        })
    }

    async fn init_import_private_key(&self, _: &str, user_id: &str) -> Result<String, ClientError> {
        Ok(format!("key-import-bundle-{user_id}"))
    }

    async fn import_private_key(
        &self,
        _: &str,
        _: &str,
        _: &str,
        encrypted_bundle: &str,
    ) -> Result<ImportedPrivateKey, ClientError> {
        let mut keys = self.imported_keys.lock().unwrap();
        if keys.iter().any(|k| k == encrypted_bundle) {
            return Err(ClientError::Remote {
                status: 400,
                message: "private key already exists".into(),
            });
        }
        keys.push(encrypted_bundle.into());
        Ok(ImportedPrivateKey {
            private_key_id: format!("pk-{}", keys.len()),
            addresses: self.fresh_addresses(1),
        })
    }

    async fn sign_transaction(
        &self,
        _: &str,
        sign_with: Address,
        unsigned_transaction: &str,
    ) -> Result<String, ClientError> {
        self.signed
            .lock()
            .unwrap()
            .push((sign_with, unsigned_transaction.into()));
        Ok(format!("0x{unsigned_transaction}ff"))
    }
}

/// Import frame holding the secret the user "typed".
pub(crate) struct FakeImportFrame {
    secret: String,
    bundle: Mutex<Option<String>>,
}

impl FakeImportFrame {
    pub(crate) fn new(secret: &str) -> Self {
        Self {
            secret: secret.into(),
            bundle: Mutex::new(None),
        }
    }

    pub(crate) fn injected_bundle(&self) -> Option<String> {
        self.bundle.lock().unwrap().clone()
    }

    fn encrypted(&self) -> Result<String, ClientError> {
        match self.injected_bundle() {
            Some(bundle) => Ok(format!("{bundle}:{}", self.secret)),
            None => Err(ClientError::Precondition("no import bundle injected".into())),
        }
    }
}

#[async_trait]
impl ImportFrame for FakeImportFrame {
    async fn inject_import_bundle(&self, bundle: &str, _: &str, _: &str) -> Result<(), ClientError> {
        *self.bundle.lock().unwrap() = Some(bundle.into());
        Ok(())
    }

    async fn extract_wallet_encrypted_bundle(&self) -> Result<String, ClientError> {
        self.encrypted()
    }

    async fn extract_key_encrypted_bundle(&self) -> Result<String, ClientError> {
        if alloy::hex::decode(&self.secret).is_err() {
            return Err(ClientError::Precondition(
                "Cannot create Uint8Array from invalid hex string".into(),
            ));
        }
        self.encrypted()
    }
}

#[derive(Default)]
pub(crate) struct FakeSession {
    read_client: Mutex<Option<Arc<dyn ReadClient>>>,
    logouts: AtomicUsize,
}

impl FakeSession {
    pub(crate) fn set_read_client(&self, client: Arc<dyn ReadClient>) {
        *self.read_client.lock().unwrap() = Some(client);
    }

    pub(crate) fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for FakeSession {
    async fn read_client(&self) -> Option<Arc<dyn ReadClient>> {
        self.read_client.lock().unwrap().clone()
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeOAuth {
    logouts: AtomicUsize,
}

impl FakeOAuth {
    pub(crate) fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuth {
    async fn logout(&self) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct FakeDirectory {
    records: Mutex<HashMap<String, UserRecord>>,
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn add_user(&self, email: &Email, sub_organization_id: &str) -> Result<UserRecord, ClientError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(email.as_str()) {
            return Err(ClientError::Remote {
                status: 500,
                message: format!("Failed to add user: {email} already exists"),
            });
        }
        let record = UserRecord {
            email: email.clone(),
            sub_organization_id: sub_organization_id.into(),
            email_verified: false,
        };
        records.insert(email.as_str().into(), record.clone());
        Ok(record)
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<UserRecord>, ClientError> {
        Ok(self.records.lock().unwrap().get(email.as_str()).cloned())
    }

    async fn verify_user_email(&self, email: &Email) -> Result<UserRecord, ClientError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(email.as_str())
            .ok_or_else(|| ClientError::NotFound(email.to_string()))?;
        record.email_verified = true;
        Ok(record.clone())
    }
}

// =============================================================================
// Chain
// =============================================================================

pub(crate) struct FakeChain {
    head: AtomicU64,
    balances: Mutex<HashMap<Address, U256>>,
    balance_calls: Mutex<Vec<Address>>,
    balance_delays: Mutex<HashMap<Address, Duration>>,
    transfers: Mutex<Vec<AssetTransfer>>,
    queries: Mutex<Vec<TransferQuery>>,
    fail_transfers: AtomicBool,
    stall_transfers: AtomicBool,
    broadcasts: Mutex<Vec<Vec<u8>>>,
}

impl FakeChain {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicU64::new(0),
            balances: Mutex::new(HashMap::new()),
            balance_calls: Mutex::new(vec![]),
            balance_delays: Mutex::new(HashMap::new()),
            transfers: Mutex::new(vec![]),
            queries: Mutex::new(vec![]),
            fail_transfers: AtomicBool::new(false),
            stall_transfers: AtomicBool::new(false),
            broadcasts: Mutex::new(vec![]),
        }
    }

    pub(crate) fn set_head(&self, block: u64) {
        self.head.store(block, Ordering::SeqCst);
    }

    pub(crate) fn set_balance(&self, address: Address, balance: U256) {
        self.balances.lock().unwrap().insert(address, balance);
    }

    pub(crate) fn delay_balance(&self, address: Address, delay: Duration) {
        self.balance_delays.lock().unwrap().insert(address, delay);
    }

    pub(crate) fn balance_calls(&self) -> Vec<Address> {
        self.balance_calls.lock().unwrap().clone()
    }

    pub(crate) fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub(crate) fn push_transfer(&self, transfer: AssetTransfer) {
        self.transfers.lock().unwrap().push(transfer);
    }

    pub(crate) fn fail_transfers(&self) {
        self.fail_transfers.store(true, Ordering::SeqCst);
    }

    /// Transfer queries never answer.
    pub(crate) fn stall_transfers(&self) {
        self.stall_transfers.store(true, Ordering::SeqCst);
    }

    /// Full-history queries (no `from_block`) issued for `address`.
    pub(crate) fn history_queries(&self, address: Address) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.address == address && q.from_block.is_none())
            .count()
    }
}

#[async_trait]
impl ChainData for FakeChain {
    async fn balance(&self, address: Address) -> Result<U256, ClientError> {
        self.balance_calls.lock().unwrap().push(address);
        let delay = self.balance_delays.lock().unwrap().get(&address).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn asset_transfers(&self, query: &TransferQuery) -> Result<Vec<AssetTransfer>, ClientError> {
        self.queries.lock().unwrap().push(query.clone());
        if self.stall_transfers.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("rpc unreachable".into()));
        }
        let from_block = query.from_block.unwrap_or(0);
        Ok(self
            .transfers
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.block_number >= from_block)
            .filter(|t| match query.direction {
                TransferDirection::Outbound => t.from == query.address,
                TransferDirection::Inbound => t.to == Some(query.address),
            })
            .cloned()
            .collect())
    }

    async fn prepare_transfer(
        &self,
        _: Address,
        to: Address,
        value: U256,
    ) -> Result<TxEip1559, ClientError> {
        Ok(TxEip1559 {
            chain_id: 11_155_111,
            nonce: self.broadcasts.lock().unwrap().len() as u64,
            gas_limit: 21_000,
            max_fee_per_gas: 3_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
            to: TxKind::Call(to),
            value,
            ..Default::default()
        })
    }

    async fn send_raw_transaction(&self, signed: &[u8]) -> Result<B256, ClientError> {
        self.broadcasts.lock().unwrap().push(signed.to_vec());
        Ok(keccak256(signed))
    }
}

// =============================================================================
// Wiring
// =============================================================================

pub(crate) struct Fakes {
    pub custody: Arc<FakeCustody>,
    pub signing: Arc<FakeSigning>,
    pub passkeys: Arc<FakePasskeys>,
    pub directory: Arc<FakeDirectory>,
    pub session: Arc<FakeSession>,
    pub oauth: Arc<FakeOAuth>,
    pub chain: Arc<FakeChain>,
    pub preferences: Arc<PreferenceStore>,
    _dir: tempfile::TempDir,
}

impl Fakes {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let preferences =
            Arc::new(PreferenceStore::open(&dir.path().join("preferences.redb")).unwrap());
        let custody = Arc::new(FakeCustody::new());
        Self {
            passkeys: Arc::new(FakePasskeys {
                custody: custody.clone(),
                login_calls: AtomicUsize::new(0),
                login_error: Mutex::new(None),
                created_passkeys: AtomicUsize::new(0),
                created_wallets: AtomicUsize::new(0),
                next_address: AtomicU8::new(0xa0),
                imported_seeds: Mutex::new(vec![]),
                imported_keys: Mutex::new(vec![]),
                signed: Mutex::new(vec![]),
            }),
            custody,
            signing: Arc::new(FakeSigning {
                injected: Mutex::new(vec![]),
            }),
            directory: Arc::new(FakeDirectory::default()),
            session: Arc::new(FakeSession::default()),
            oauth: Arc::new(FakeOAuth::default()),
            chain: Arc::new(FakeChain::new()),
            preferences,
            _dir: dir,
        }
    }

    pub(crate) fn auth_deps(&self) -> AuthDeps {
        AuthDeps {
            custody: self.custody.clone(),
            directory: self.directory.clone(),
            signing: self.signing.clone(),
            passkeys: self.passkeys.clone(),
            session: self.session.clone(),
            oauth: self.oauth.clone(),
        }
    }

    pub(crate) fn wallet_deps(&self) -> WalletDeps {
        WalletDeps {
            custody: self.custody.clone(),
            session: self.session.clone(),
            passkeys: self.passkeys.clone(),
            chain: self.chain.clone(),
            preferences: self.preferences.clone(),
        }
    }

    pub(crate) fn controller(&self) -> AuthController {
        AuthController::new(
            self.auth_deps(),
            "https://app.example.com".parse().unwrap(),
        )
    }

    pub(crate) fn authenticators(&self) -> AuthenticatorManager {
        AuthenticatorManager::new(self.custody.clone(), self.passkeys.clone())
    }

    pub(crate) fn wallet_sync(&self, user: User) -> WalletSync {
        WalletSync::new(self.wallet_deps(), user)
    }

    pub(crate) fn transaction_sync(&self) -> TransactionSync {
        TransactionSync::new(self.chain.clone(), None).with_poll_interval(Duration::from_millis(5))
    }

    pub(crate) fn seed_directory(&self, record: UserRecord) {
        self.directory
            .records
            .lock()
            .unwrap()
            .insert(record.email.as_str().into(), record);
    }

    pub(crate) fn directory_record(&self, email: &str) -> Option<UserRecord> {
        self.directory.records.lock().unwrap().get(email).cloned()
    }
}
