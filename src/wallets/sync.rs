// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! [`WalletSync`]: loads and mutates one user's wallets.
//!
//! Balances are fetched only for the selected account. Each fetch is tagged
//! with its address and the reducer drops results for an account that is no
//! longer selected. After [`WalletSync::close`] nothing is dispatched.
//!
//! Imports go through an [`ImportFrame`]: the provider issues an import
//! bundle, the frame encrypts the user's secret to it, and only the
//! encrypted bundle reaches the provider. Sends are filled in by the chain
//! client, signed by the provider and broadcast back through the chain
//! client.

use std::sync::Arc;

use alloy::primitives::{utils::parse_ether, Address, U256};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::state::{reduce, WalletsAction, WalletsState};
use crate::chain::{unsigned_payload, wei_to_ether, ChainData};
use crate::custody::{
    default_ethereum_account_at_index, wallets_with_accounts, CreatedWallet, CustodyApi,
    ImportFrame, ImportedPrivateKey, NewWalletAccount, PasskeyClient, SessionProvider,
    WalletAccountRecord,
};
use crate::error::{ClientError, ErrorKind};
use crate::models::{Account, PreferredWallet, Transaction, TxStatus, User, Wallet};
use crate::storage::PreferenceStore;

pub const DEFAULT_NEW_WALLET_NAME: &str = "New Wallet";

/// What the user pastes into the import frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    SeedPhrase,
    PrivateKey,
}

#[derive(Clone)]
pub struct WalletDeps {
    pub custody: Arc<dyn CustodyApi>,
    pub session: Arc<dyn SessionProvider>,
    pub passkeys: Arc<dyn PasskeyClient>,
    pub chain: Arc<dyn ChainData>,
    pub preferences: Arc<PreferenceStore>,
}

pub struct WalletSync {
    deps: WalletDeps,
    user: User,
    state: watch::Sender<WalletsState>,
    alive: CancellationToken,
}

impl WalletSync {
    pub fn new(deps: WalletDeps, user: User) -> Self {
        let (state, _) = watch::channel(WalletsState::default());
        Self {
            deps,
            user,
            state,
            alive: CancellationToken::new(),
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletsState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> WalletsState {
        self.state.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.alive.is_cancelled()
    }

    /// Reset the state and ignore every late result from here on.
    pub fn close(&self) {
        self.dispatch(WalletsAction::Reset);
        self.alive.cancel();
    }

    fn dispatch(&self, action: WalletsAction) {
        if self.alive.is_cancelled() {
            tracing::debug!(action = action.name(), "Wallet sync closed, dropping update");
            return;
        }
        let name = action.name();
        self.state.send_modify(|state| *state = reduce(state, action));
        tracing::debug!(action = name, "Wallets transition");
    }

    fn fail(&self, operation: &'static str, error: ClientError) -> ErrorKind {
        let kind = error.kind();
        tracing::warn!(operation, error = %error, ?kind, "Wallet operation failed");
        self.dispatch(WalletsAction::Error(kind));
        kind
    }

    fn organization_id(&self) -> &str {
        &self.user.organization.organization_id
    }

    // =========================================================================
    // Loading & selection
    // =========================================================================

    /// Fetch every wallet with its accounts and restore the preferred wallet.
    ///
    /// Uses the read-only session when there is one, otherwise the
    /// server-side listing by sub-organization.
    pub async fn load(&self) -> Result<(), ErrorKind> {
        self.dispatch(WalletsAction::Loading);

        let wallets = match self.fetch_wallets().await {
            Ok(wallets) => wallets,
            Err(e) => return Err(self.fail("load", e)),
        };
        let preferred = self
            .deps
            .preferences
            .preferred_wallet_for(&self.user.user_id)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not read preferred wallet");
                None
            });

        tracing::info!(count = wallets.len(), "Wallets loaded");
        self.dispatch(WalletsAction::Loaded { wallets, preferred });
        self.refresh_balance().await;
        Ok(())
    }

    async fn fetch_wallets(&self) -> Result<Vec<Wallet>, ClientError> {
        let organization_id = self.organization_id();
        match self.deps.session.read_client().await {
            Some(client) => wallets_with_accounts(client.as_ref(), organization_id).await,
            None => {
                tracing::debug!("No read-only session yet, listing wallets server-side");
                wallets_with_accounts(self.deps.custody.as_ref(), organization_id).await
            }
        }
    }

    /// Select a wallet (and its first account) and remember it.
    pub async fn select_wallet(&self, wallet_id: &str) -> Result<(), ErrorKind> {
        if !self.state.borrow().wallets.iter().any(|w| w.wallet_id == wallet_id) {
            return Err(self.fail(
                "select_wallet",
                ClientError::NotFound(format!("wallet {wallet_id}")),
            ));
        }

        self.dispatch(WalletsAction::SelectWallet(wallet_id.to_string()));
        self.remember(wallet_id);
        self.refresh_balance().await;
        Ok(())
    }

    /// Select an account of the current wallet; its balance is refetched.
    pub async fn select_account(&self, address: Address) {
        self.dispatch(WalletsAction::SelectAccount(address));
        self.refresh_balance().await;
    }

    /// Refetch the selected account's balance.
    pub async fn refresh_balance(&self) {
        let Some(address) = self.state.borrow().selected_address() else {
            return;
        };

        match self.deps.chain.balance(address).await {
            Ok(balance) => self.dispatch(WalletsAction::BalanceFetched { address, balance }),
            Err(e) => {
                self.fail("balance", e);
            }
        }
    }

    fn remember(&self, wallet_id: &str) {
        let preference = PreferredWallet {
            user_id: self.user.user_id.clone(),
            wallet_id: wallet_id.to_string(),
        };
        if let Err(e) = self.deps.preferences.set_preferred_wallet(&preference) {
            tracing::warn!(error = %e, "Could not persist preferred wallet");
        }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a wallet with one default account and select it.
    pub async fn new_wallet(&self, name: Option<&str>) -> Result<Wallet, ErrorKind> {
        let name = match name.map(str::trim) {
            None => DEFAULT_NEW_WALLET_NAME,
            Some("") => {
                return Err(self.fail(
                    "new_wallet",
                    ClientError::Precondition("wallet name is empty".into()),
                ))
            }
            Some(name) => name,
        };

        self.dispatch(WalletsAction::Loading);
        let wallet = match self.create_wallet(name).await {
            Ok(wallet) => wallet,
            Err(e) => return Err(self.fail("new_wallet", e)),
        };

        tracing::info!(wallet_id = %wallet.wallet_id, "Wallet created");
        self.dispatch(WalletsAction::WalletAdded(wallet.clone()));
        self.remember(&wallet.wallet_id);
        self.refresh_balance().await;
        Ok(wallet)
    }

    async fn create_wallet(&self, name: &str) -> Result<Wallet, ClientError> {
        let params = default_ethereum_account_at_index(0);
        let created = self
            .deps
            .passkeys
            .create_wallet(self.organization_id(), name, std::slice::from_ref(&params))
            .await?;
        self.wallet(created, name, &params)
    }

    fn wallet(
        &self,
        created: CreatedWallet,
        name: &str,
        params: &NewWalletAccount,
    ) -> Result<Wallet, ClientError> {
        let accounts = created
            .addresses
            .iter()
            .map(|address| self.account(&created.wallet_id, params, address))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Wallet {
            wallet_id: created.wallet_id,
            wallet_name: name.to_string(),
            accounts,
        })
    }

    /// Derive the next account of the selected wallet.
    pub async fn new_wallet_account(&self) -> Result<Account, ErrorKind> {
        let selected = self
            .state
            .borrow()
            .selected_wallet()
            .map(|w| (w.wallet_id.clone(), w.accounts.len()));
        let Some((wallet_id, index)) = selected else {
            return Err(self.fail(
                "new_wallet_account",
                ClientError::Precondition("no wallet selected".into()),
            ));
        };

        self.dispatch(WalletsAction::Loading);
        let account = match self.create_account(&wallet_id, index).await {
            Ok(account) => account,
            Err(e) => return Err(self.fail("new_wallet_account", e)),
        };

        tracing::info!(%wallet_id, address = %account.address, "Account created");
        self.dispatch(WalletsAction::AccountAdded {
            wallet_id,
            account: account.clone(),
        });
        Ok(account)
    }

    async fn create_account(&self, wallet_id: &str, index: usize) -> Result<Account, ClientError> {
        let params = default_ethereum_account_at_index(index);
        let addresses = self
            .deps
            .passkeys
            .create_wallet_accounts(self.organization_id(), wallet_id, std::slice::from_ref(&params))
            .await?;
        let address = addresses
            .first()
            .ok_or_else(|| ClientError::Decode("account creation returned no address".into()))?;
        self.account(wallet_id, &params, address)
    }

    // =========================================================================
    // Import
    // =========================================================================

    /// Ask the provider for an import bundle and hand it to `frame`.
    pub async fn init_import(&self, frame: &dyn ImportFrame, kind: ImportKind) -> Result<(), ErrorKind> {
        let organization_id = self.organization_id();
        let user_id = self.user.user_id.as_str();
        let bundle = match kind {
            ImportKind::SeedPhrase => {
                self.deps
                    .passkeys
                    .init_import_wallet(organization_id, user_id)
                    .await
            }
            ImportKind::PrivateKey => {
                self.deps
                    .passkeys
                    .init_import_private_key(organization_id, user_id)
                    .await
            }
        };

        let injected = match bundle {
            Ok(bundle) => frame.inject_import_bundle(&bundle, organization_id, user_id).await,
            Err(e) => Err(e),
        };
        injected.map_err(|e| self.fail("init_import", e))?;
        tracing::debug!(?kind, "Import bundle injected");
        Ok(())
    }

    /// Import the seed phrase entered in `frame` as a new wallet and select it.
    pub async fn import_wallet(&self, frame: &dyn ImportFrame, name: &str) -> Result<Wallet, ErrorKind> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.fail(
                "import_wallet",
                ClientError::Precondition("wallet name is empty".into()),
            ));
        }

        self.dispatch(WalletsAction::Loading);
        let wallet = match self.imported_wallet(frame, name).await {
            Ok(wallet) => wallet,
            Err(e) => return Err(self.fail("import_wallet", e)),
        };

        tracing::info!(wallet_id = %wallet.wallet_id, "Wallet imported");
        self.dispatch(WalletsAction::WalletAdded(wallet.clone()));
        self.remember(&wallet.wallet_id);
        self.refresh_balance().await;
        Ok(wallet)
    }

    async fn imported_wallet(&self, frame: &dyn ImportFrame, name: &str) -> Result<Wallet, ClientError> {
        let bundle = frame.extract_wallet_encrypted_bundle().await?;
        let params = default_ethereum_account_at_index(0);
        let created = self
            .deps
            .passkeys
            .import_wallet(
                self.organization_id(),
                &self.user.user_id,
                name,
                &bundle,
                std::slice::from_ref(&params),
            )
            .await?;
        self.wallet(created, name, &params)
    }

    /// Import the private key entered in `frame`. Keys are not wallets, so
    /// the wallet list is left as is.
    pub async fn import_private_key(
        &self,
        frame: &dyn ImportFrame,
        name: &str,
    ) -> Result<ImportedPrivateKey, ErrorKind> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.fail(
                "import_private_key",
                ClientError::Precondition("private key name is empty".into()),
            ));
        }

        let imported = match frame.extract_key_encrypted_bundle().await {
            Ok(bundle) => {
                self.deps
                    .passkeys
                    .import_private_key(self.organization_id(), &self.user.user_id, name, &bundle)
                    .await
            }
            Err(e) => Err(e),
        };
        let imported = imported.map_err(|e| self.fail("import_private_key", e))?;
        tracing::info!(private_key_id = %imported.private_key_id, "Private key imported");
        Ok(imported)
    }

    // =========================================================================
    // Send
    // =========================================================================

    /// Send `amount` ETH (decimal string) from the selected account.
    ///
    /// Returns the broadcast transaction as a pending row.
    pub async fn send_eth(&self, to: Address, amount: &str) -> Result<Transaction, ErrorKind> {
        let value = match parse_amount(amount) {
            Ok(value) => value,
            Err(e) => return Err(self.fail("send_eth", e)),
        };
        let selected = self.state.borrow().selected_address();
        let Some(from) = selected else {
            return Err(self.fail(
                "send_eth",
                ClientError::Precondition("no account selected".into()),
            ));
        };

        let hash = match self.sign_and_send(from, to, value).await {
            Ok(hash) => hash,
            Err(e) => return Err(self.fail("send_eth", e)),
        };

        tracing::info!(%from, %to, tx_hash = %hash, "ETH sent");
        self.refresh_balance().await;
        Ok(Transaction {
            hash,
            block_number: 0,
            value: Some(wei_to_ether(value)),
            from,
            to: Some(to),
            status: TxStatus::Pending,
            timestamp: None,
        })
    }

    async fn sign_and_send(&self, from: Address, to: Address, value: U256) -> Result<String, ClientError> {
        let unsigned = self.deps.chain.prepare_transfer(from, to, value).await?;
        let signed = self
            .deps
            .passkeys
            .sign_transaction(self.organization_id(), from, &unsigned_payload(&unsigned))
            .await?;
        let raw = alloy::hex::decode(signed.trim())
            .map_err(|e| ClientError::Decode(format!("signed transaction: {e}")))?;
        let hash = self.deps.chain.send_raw_transaction(&raw).await?;
        Ok(hash.to_string())
    }

    fn account(
        &self,
        wallet_id: &str,
        params: &NewWalletAccount,
        address: &str,
    ) -> Result<Account, ClientError> {
        WalletAccountRecord {
            organization_id: self.organization_id().to_string(),
            wallet_id: wallet_id.to_string(),
            curve: params.curve.clone(),
            path_format: params.path_format.clone(),
            path: params.path.clone(),
            address_format: params.address_format.clone(),
            address: address.to_string(),
        }
        .into_account()
    }
}

/// Positive decimal ETH amount in wei.
fn parse_amount(amount: &str) -> Result<U256, ClientError> {
    let amount = amount.trim();
    if amount.starts_with('-') {
        return Err(ClientError::Precondition(format!("negative amount {amount}")));
    }
    let value = parse_ether(amount)
        .map_err(|e| ClientError::Precondition(format!("invalid amount {amount}: {e}")))?;
    if value.is_zero() {
        return Err(ClientError::Precondition("amount is zero".into()));
    }
    Ok(value)
}
