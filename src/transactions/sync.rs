// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! [`TransactionSync`]: history plus live watches for the selected address.
//!
//! Selecting an address releases the previous address's watches before
//! anything else happens. The mined watch is attached before the history
//! fetch so nothing mined in between is lost; overlap is deduplicated by
//! hash in the reducer. The history fetch never holds the watch lock and is
//! dropped once its watch is released.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::state::{reduce, TransactionsAction, TransactionsState};
use crate::chain::{
    fetch_history, watch_mined_transactions, watch_pending_transactions, ChainData, WatchHandle,
    DEFAULT_POLL_INTERVAL,
};
use crate::error::ErrorKind;
use crate::models::Transaction;

const WATCH_CHANNEL_CAPACITY: usize = 64;

/// Live subscriptions for one address.
struct ActiveWatch {
    address: Address,
    mined: WatchHandle,
    pending: Option<WatchHandle>,
    alive: CancellationToken,
    forward: JoinHandle<()>,
}

impl ActiveWatch {
    async fn release(self) {
        self.alive.cancel();
        self.mined.unwatch().await;
        if let Some(pending) = self.pending {
            pending.unwatch().await;
        }
        // Both senders are gone once the watches have exited.
        let _ = self.forward.await;
        tracing::debug!(address = %self.address, "Transaction watch released");
    }
}

pub struct TransactionSync {
    chain: Arc<dyn ChainData>,
    ws_url: Option<Url>,
    poll_interval: Duration,
    state: Arc<watch::Sender<TransactionsState>>,
    active: Mutex<Option<ActiveWatch>>,
}

impl TransactionSync {
    pub fn new(chain: Arc<dyn ChainData>, ws_url: Option<Url>) -> Self {
        let (state, _) = watch::channel(TransactionsState::default());
        Self {
            chain,
            ws_url,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: Arc::new(state),
            active: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionsState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TransactionsState {
        self.state.borrow().clone()
    }

    pub async fn watched_address(&self) -> Option<Address> {
        self.active.lock().await.as_ref().map(|a| a.address)
    }

    fn dispatch(&self, action: TransactionsAction) {
        apply(&self.state, action);
    }

    /// Make `address` the watched address, fetching its history the first
    /// time it is selected.
    pub async fn select_address(&self, address: Address) -> Result<(), ErrorKind> {
        match self.watch_address(address).await {
            Some(alive) => self.load_history(address, alive).await,
            None => Ok(()),
        }
    }

    /// Swap the live watches over to `address`.
    ///
    /// Returns the new watch's token when its history still has to be
    /// fetched; [`TransactionSync::load_history`] does that without holding
    /// the lock.
    pub(crate) async fn watch_address(&self, address: Address) -> Option<CancellationToken> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|a| a.address == address) {
            return None;
        }
        if let Some(previous) = active.take() {
            previous.release().await;
        }

        let watch = self.attach(address);
        let alive = watch.alive.clone();
        *active = Some(watch);

        if self.state.borrow().is_loaded(&address) {
            if self.state.borrow().loading {
                self.dispatch(TransactionsAction::Idle);
            }
            return None;
        }
        self.dispatch(TransactionsAction::Loading);
        Some(alive)
    }

    /// Fetch the full history of `address`. Abandoned as soon as the watch
    /// behind `alive` is released; the result is only applied while
    /// `address` is still the watched one.
    pub(crate) async fn load_history(
        &self,
        address: Address,
        alive: CancellationToken,
    ) -> Result<(), ErrorKind> {
        let fetched = tokio::select! {
            result = fetch_history(self.chain.as_ref(), address) => result,
            _ = alive.cancelled() => {
                tracing::debug!(%address, "History fetch abandoned");
                return Ok(());
            }
        };

        let active = self.active.lock().await;
        if alive.is_cancelled() || active.as_ref().map(|a| a.address) != Some(address) {
            tracing::debug!(%address, "Dropping history for an address no longer watched");
            return Ok(());
        }

        match fetched {
            Ok(transactions) => {
                tracing::info!(%address, count = transactions.len(), "Transaction history loaded");
                self.dispatch(TransactionsAction::HistoryLoaded {
                    address,
                    transactions,
                });
                Ok(())
            }
            Err(e) => {
                let kind = e.kind();
                tracing::warn!(%address, error = %e, ?kind, "Transaction history fetch failed");
                self.dispatch(TransactionsAction::Error(kind));
                Err(kind)
            }
        }
    }

    /// Drop the current watches, if any. Rows already loaded are kept.
    pub async fn release(&self) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.release().await;
        }
        if self.state.borrow().loading {
            self.dispatch(TransactionsAction::Idle);
        }
    }

    /// Drop the watches and forget every address's rows.
    pub async fn clear(&self) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.release().await;
        }
        self.dispatch(TransactionsAction::Reset);
        tracing::debug!("Transaction state cleared");
    }

    /// Record a locally sent transaction ahead of the watches seeing it.
    pub fn add_pending(&self, address: Address, transaction: Transaction) {
        self.dispatch(TransactionsAction::Add {
            address,
            transaction,
        });
    }

    fn attach(&self, address: Address) -> ActiveWatch {
        let (sink, mut events) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

        let mined = watch_mined_transactions(
            self.chain.clone(),
            address,
            sink.clone(),
            self.poll_interval,
        );
        let pending = self
            .ws_url
            .clone()
            .map(|url| watch_pending_transactions(url, address, sink.clone()));
        drop(sink);

        let alive = CancellationToken::new();
        let forward = {
            let alive = alive.clone();
            let state = self.state.clone();
            tokio::spawn(async move {
                while let Some(transaction) = events.recv().await {
                    if alive.is_cancelled() {
                        break;
                    }
                    apply(
                        &state,
                        TransactionsAction::Add {
                            address,
                            transaction,
                        },
                    );
                }
            })
        };

        tracing::debug!(%address, pending = pending.is_some(), "Transaction watch attached");
        ActiveWatch {
            address,
            mined,
            pending,
            alive,
            forward,
        }
    }
}

fn apply(state: &watch::Sender<TransactionsState>, action: TransactionsAction) {
    let name = action.name();
    state.send_modify(|s| *s = reduce(s, action));
    tracing::debug!(action = name, "Transactions transition");
}
