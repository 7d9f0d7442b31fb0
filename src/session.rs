// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Session
//!
//! Top-level context that ties the controllers together:
//!
//! 1. a user appears in the auth state: a [`WalletSync`] is created for them
//!    and its initial load starts
//! 2. the selected account changes: [`TransactionSync`] follows it
//! 3. the user logs out (or shutdown is requested): wallets are closed, the
//!    transaction watches released and every loaded history forgotten
//!
//! Sends go through [`WalletSession::send_eth`] so the pending row shows up
//! in the activity list before the transfer is mined.
//!
//! Runs as a background task in the same shape as the other loops in this
//! crate: `run(self, shutdown)` selecting over its inputs and the
//! cancellation token.

use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthController, AuthState};
use crate::error::ErrorKind;
use crate::models::Transaction;
use crate::transactions::TransactionSync;
use crate::wallets::{WalletDeps, WalletSync, WalletsState};

struct ActiveUser {
    user_id: String,
    wallets: Arc<WalletSync>,
    selection: watch::Receiver<WalletsState>,
    watched: Option<Address>,
}

pub struct WalletSession {
    auth: Arc<AuthController>,
    wallet_deps: WalletDeps,
    transactions: Arc<TransactionSync>,
    current: watch::Sender<Option<Arc<WalletSync>>>,
}

impl WalletSession {
    pub fn new(
        auth: Arc<AuthController>,
        wallet_deps: WalletDeps,
        transactions: Arc<TransactionSync>,
    ) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            auth,
            wallet_deps,
            transactions,
            current,
        }
    }

    pub fn auth(&self) -> &Arc<AuthController> {
        &self.auth
    }

    pub fn transactions(&self) -> &Arc<TransactionSync> {
        &self.transactions
    }

    /// Wallet controller of the signed-in user, if any.
    pub fn wallets(&self) -> Option<Arc<WalletSync>> {
        self.current.borrow().clone()
    }

    pub fn subscribe_wallets(&self) -> watch::Receiver<Option<Arc<WalletSync>>> {
        self.current.subscribe()
    }

    /// Send ETH from the selected account and list it as pending.
    pub async fn send_eth(&self, to: Address, amount: &str) -> Result<Transaction, ErrorKind> {
        let Some(wallets) = self.wallets() else {
            tracing::warn!("Send requested without a signed-in user");
            return Err(ErrorKind::Unexpected);
        };
        let transaction = wallets.send_eth(to, amount).await?;
        self.transactions
            .add_pending(transaction.from, transaction.clone());
        Ok(transaction)
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!("Wallet session started");
        let mut auth = self.auth.subscribe();
        let mut active: Option<ActiveUser> = None;

        let initial = auth.borrow_and_update().clone();
        self.on_auth_change(&initial, &mut active).await;

        loop {
            tokio::select! {
                changed = auth.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = auth.borrow_and_update().clone();
                    self.on_auth_change(&state, &mut active).await;
                }
                Some(address) = selection_changed(&mut active) => {
                    self.follow(address, &mut active).await;
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Wallet session shutting down");
                    break;
                }
            }
        }

        self.end(&mut active).await;
        tracing::info!("Wallet session stopped");
    }

    async fn on_auth_change(&self, state: &AuthState, active: &mut Option<ActiveUser>) {
        let user = state.user();
        let same_user = match (user, active.as_ref()) {
            (Some(user), Some(current)) => user.user_id == current.user_id,
            (None, None) => true,
            _ => false,
        };
        if same_user {
            return;
        }

        self.end(active).await;

        let Some(user) = user else {
            return;
        };
        tracing::info!(user_id = %user.user_id, "Starting wallet sync");
        let wallets = Arc::new(WalletSync::new(self.wallet_deps.clone(), user.clone()));
        let selection = wallets.subscribe();
        self.current.send_replace(Some(wallets.clone()));

        tokio::spawn({
            let wallets = wallets.clone();
            async move {
                // Failures are already recorded in the wallets state.
                let _ = wallets.load().await;
            }
        });

        *active = Some(ActiveUser {
            user_id: user.user_id.clone(),
            wallets,
            selection,
            watched: None,
        });
    }

    async fn follow(&self, address: Option<Address>, active: &mut Option<ActiveUser>) {
        let Some(current) = active.as_mut() else {
            return;
        };
        if current.watched == address {
            return;
        }
        current.watched = address;

        match address {
            Some(address) => {
                let Some(alive) = self.transactions.watch_address(address).await else {
                    return;
                };
                // Off the loop, so logout and shutdown are seen while it runs.
                let transactions = self.transactions.clone();
                tokio::spawn(async move {
                    // Errors land in the transactions state.
                    let _ = transactions.load_history(address, alive).await;
                });
            }
            None => self.transactions.release().await,
        }
    }

    async fn end(&self, active: &mut Option<ActiveUser>) {
        let Some(previous) = active.take() else {
            return;
        };
        tracing::info!(user_id = %previous.user_id, "Ending wallet sync");
        self.transactions.clear().await;
        previous.wallets.close();
        self.current.send_replace(None);
    }
}

/// Resolves with the selected address whenever the wallets state changes.
async fn selection_changed(active: &mut Option<ActiveUser>) -> Option<Option<Address>> {
    let Some(current) = active.as_mut() else {
        return std::future::pending().await;
    };
    if current.selection.changed().await.is_err() {
        return std::future::pending().await;
    }
    let address = current.selection.borrow_and_update().selected_address();
    Some(address)
}
