// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mined-transaction watch and the subscription handle shared by all watches.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::history::fetch_range;
use super::ChainData;
use crate::models::Transaction;

/// Default head-polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Live subscription. The background task stops when the handle is released
/// with [`WatchHandle::unwatch`] or dropped.
#[derive(Debug)]
pub struct WatchHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub(crate) fn new(token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            token,
            task: Some(task),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the watch and wait for its task to exit.
    pub async fn unwatch(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Watch `address` for newly mined transfers, delivering them to `sink`.
///
/// Starts from the current head; history before that is the caller's job.
pub fn watch_mined_transactions(
    chain: Arc<dyn ChainData>,
    address: Address,
    sink: mpsc::Sender<Transaction>,
    interval: Duration,
) -> WatchHandle {
    let token = CancellationToken::new();
    let watcher = MinedWatcher {
        chain,
        address,
        sink,
        interval,
    };
    let task = tokio::spawn(watcher.run(token.clone()));
    WatchHandle::new(token, task)
}

struct MinedWatcher {
    chain: Arc<dyn ChainData>,
    address: Address,
    sink: mpsc::Sender<Transaction>,
    interval: Duration,
}

impl MinedWatcher {
    async fn run(self, shutdown: CancellationToken) {
        tracing::debug!(address = %self.address, "Mined-transaction watch starting");
        let mut last_block: Option<u64> = None;

        loop {
            let step = tokio::select! {
                step = self.step(last_block) => step,
                _ = shutdown.cancelled() => break,
            };

            match step {
                Ok(Some(head)) => last_block = Some(head),
                Ok(None) => {}
                Err(StepError::SinkClosed) => break,
                Err(StepError::Chain(e)) => {
                    tracing::warn!(address = %self.address, error = %e, "Watch step failed, will retry");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::debug!(address = %self.address, "Mined-transaction watch stopped");
    }

    /// Poll once; returns the new checkpoint when the head moved.
    async fn step(&self, last_block: Option<u64>) -> Result<Option<u64>, StepError> {
        let head = self.chain.block_number().await.map_err(StepError::Chain)?;
        let Some(last) = last_block else {
            return Ok(Some(head));
        };
        if head <= last {
            return Ok(None);
        }

        let transactions = fetch_range(self.chain.as_ref(), self.address, Some(last + 1))
            .await
            .map_err(StepError::Chain)?;

        // Oldest first so consumers prepend in chain order.
        for tx in transactions.into_iter().rev() {
            self.sink.send(tx).await.map_err(|_| StepError::SinkClosed)?;
        }
        Ok(Some(head))
    }
}

enum StepError {
    Chain(crate::error::ClientError),
    SinkClosed,
}
