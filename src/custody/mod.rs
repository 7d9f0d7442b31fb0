// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Custody Provider
//!
//! The wallet-custody provider owns all key material. This module describes
//! the parts of it the crate consumes, as traits, and ships an HTTP client
//! for the server-side API.
//!
//! | Trait | Lives where | Used for |
//! |-------|-------------|----------|
//! | [`CustodyApi`] | server, API-key stamped | sub-orgs, credential exchange, listing |
//! | [`ReadClient`] | client, read-only session | wallet/account listing |
//! | [`SigningContext`] | isolated iframe | credential bundle injection + login |
//! | [`PasskeyClient`] | browser WebAuthn | passkey login and passkey-signed writes |
//! | [`ImportFrame`] | isolated iframe | seed phrase or private key entry for imports |
//! | [`SessionProvider`] | client | current read session, logout |
//! | [`OAuthProvider`] | client | identity-provider logout hook |
//!
//! Client-side implementations are supplied by the host; every controller
//! receives them by injection.

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde_json::Value;

use crate::error::ClientError;
use crate::models::{Authenticator, LoginResponse, Session, Wallet};

pub mod client;
pub mod proxy;
pub mod stamp;
pub mod types;

pub use client::{ActivityPolling, HttpCustodyClient};
pub use proxy::{Endpoint, MethodNotAllowed, ProxyMethod, ProxyRequest};
pub use stamp::ApiKeyStamper;
pub use types::*;

/// Read-only listing of wallets and their accounts.
#[async_trait]
pub trait ReadClient: Send + Sync {
    async fn wallets(&self, organization_id: &str) -> Result<Vec<WalletSummary>, ClientError>;

    async fn wallet_accounts(
        &self,
        organization_id: &str,
        wallet_id: &str,
    ) -> Result<Vec<WalletAccountRecord>, ClientError>;
}

/// Server-side provider API.
#[async_trait]
pub trait CustodyApi: ReadClient {
    async fn sub_organization_ids(&self, filter: &SubOrgFilter) -> Result<Vec<String>, ClientError>;

    async fn create_sub_organization(
        &self,
        request: &CreateSubOrganization,
    ) -> Result<CreatedSubOrganization, ClientError>;

    /// Ask the provider to email a credential bundle encrypted to
    /// `request.target_public_key`.
    async fn email_auth(&self, request: &EmailAuthRequest) -> Result<EmailAuthResult, ClientError>;

    /// Exchange an OIDC token for a credential bundle.
    async fn oauth(&self, request: &OAuthRequest) -> Result<OAuthResult, ClientError>;

    async fn user(&self, organization_id: &str, user_id: &str) -> Result<ProviderUser, ClientError>;

    async fn wallet(
        &self,
        organization_id: &str,
        wallet_id: &str,
    ) -> Result<WalletSummary, ClientError>;

    async fn authenticators(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<Vec<Authenticator>, ClientError>;

    async fn authenticator(
        &self,
        organization_id: &str,
        authenticator_id: &str,
    ) -> Result<Authenticator, ClientError>;

    /// Forward an allow-listed call with a caller-supplied request object.
    async fn forward(&self, method: ProxyMethod, request: Value) -> Result<Value, ClientError>;
}

/// Isolated signing context that receives credential bundles.
#[async_trait]
pub trait SigningContext: Send + Sync {
    /// Ephemeral public key bundles are encrypted to.
    fn public_key(&self) -> Option<String>;

    async fn inject_credential_bundle(&self, bundle: &str) -> Result<(), ClientError>;

    async fn login(&self) -> Result<LoginResponse, ClientError>;
}

/// Passkey-backed login and passkey-signed write operations.
#[async_trait]
pub trait PasskeyClient: Send + Sync {
    async fn login(&self, organization_id: Option<&str>) -> Result<LoginResponse, ClientError>;

    /// Run a WebAuthn registration ceremony.
    async fn create_user_passkey(
        &self,
        authenticator_name: &str,
        user_name: &str,
    ) -> Result<PasskeyCredential, ClientError>;

    async fn create_read_write_session(&self, organization_id: &str)
        -> Result<Session, ClientError>;

    async fn create_wallet(
        &self,
        organization_id: &str,
        wallet_name: &str,
        accounts: &[NewWalletAccount],
    ) -> Result<CreatedWallet, ClientError>;

    /// Returns the new addresses.
    async fn create_wallet_accounts(
        &self,
        organization_id: &str,
        wallet_id: &str,
        accounts: &[NewWalletAccount],
    ) -> Result<Vec<String>, ClientError>;

    /// Returns the new authenticator id.
    async fn create_authenticator(
        &self,
        organization_id: &str,
        user_id: &str,
        authenticator_name: &str,
        credential: &PasskeyCredential,
    ) -> Result<String, ClientError>;

    async fn delete_authenticators(
        &self,
        organization_id: &str,
        user_id: &str,
        authenticator_ids: &[String],
    ) -> Result<(), ClientError>;

    /// Returns the import bundle for [`ImportFrame::inject_import_bundle`].
    async fn init_import_wallet(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<String, ClientError>;

    async fn import_wallet(
        &self,
        organization_id: &str,
        user_id: &str,
        wallet_name: &str,
        encrypted_bundle: &str,
        accounts: &[NewWalletAccount],
    ) -> Result<CreatedWallet, ClientError>;

    async fn init_import_private_key(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<String, ClientError>;

    /// secp256k1 key with an Ethereum address.
    async fn import_private_key(
        &self,
        organization_id: &str,
        user_id: &str,
        private_key_name: &str,
        encrypted_bundle: &str,
    ) -> Result<ImportedPrivateKey, ClientError>;

    /// Sign a hex-encoded unsigned Ethereum transaction with the key behind
    /// `sign_with`. Returns the signed transaction, hex-encoded.
    async fn sign_transaction(
        &self,
        organization_id: &str,
        sign_with: Address,
        unsigned_transaction: &str,
    ) -> Result<String, ClientError>;
}

/// Isolated frame the user types a seed phrase or private key into. The
/// secret only leaves it encrypted to the provider.
#[async_trait]
pub trait ImportFrame: Send + Sync {
    async fn inject_import_bundle(
        &self,
        bundle: &str,
        organization_id: &str,
        user_id: &str,
    ) -> Result<(), ClientError>;

    async fn extract_wallet_encrypted_bundle(&self) -> Result<String, ClientError>;

    async fn extract_key_encrypted_bundle(&self) -> Result<String, ClientError>;
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Client bound to the current read-only session, if one exists yet.
    async fn read_client(&self) -> Option<Arc<dyn ReadClient>>;

    async fn logout(&self) -> Result<(), ClientError>;
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Forget the cached identity so the next sign-in prompts again.
    async fn logout(&self);
}

// =============================================================================
// Helpers
// =============================================================================

/// First sub-organization matching the filter, if any.
pub async fn find_sub_organization<C: CustodyApi + ?Sized>(
    api: &C,
    filter: &SubOrgFilter,
) -> Result<Option<String>, ClientError> {
    Ok(api.sub_organization_ids(filter).await?.into_iter().next())
}

/// All wallets of an organization with their accounts (balances unfetched).
pub async fn wallets_with_accounts<C: ReadClient + ?Sized>(
    client: &C,
    organization_id: &str,
) -> Result<Vec<Wallet>, ClientError> {
    let summaries = client.wallets(organization_id).await?;
    try_join_all(
        summaries
            .into_iter()
            .map(|summary| wallet_with_accounts(client, organization_id, summary)),
    )
    .await
}

async fn wallet_with_accounts<C: ReadClient + ?Sized>(
    client: &C,
    organization_id: &str,
    summary: WalletSummary,
) -> Result<Wallet, ClientError> {
    let accounts = client
        .wallet_accounts(organization_id, &summary.wallet_id)
        .await?
        .into_iter()
        .map(WalletAccountRecord::into_account)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(summary.with_accounts(accounts))
}

/// One wallet with its accounts.
pub async fn fetch_wallet<C: CustodyApi + ?Sized>(
    api: &C,
    organization_id: &str,
    wallet_id: &str,
) -> Result<Wallet, ClientError> {
    let summary = api.wallet(organization_id, wallet_id).await?;
    wallet_with_accounts(api, organization_id, summary).await
}
