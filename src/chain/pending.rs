// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pending-transaction watch over the provider's websocket endpoint.
//!
//! Subscribes with `eth_subscribe("alchemy_pendingTransactions", {fromAddress, toAddress})`
//! and reconnects after a delay until the handle is released.

use std::time::Duration;

use alloy::primitives::{Address, U256};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{wei_to_ether, WatchHandle};
use crate::error::ClientError;
use crate::models::{Transaction, TxStatus};

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Watch `address` for pending transactions, delivering them to `sink`.
pub fn watch_pending_transactions(
    ws_url: Url,
    address: Address,
    sink: mpsc::Sender<Transaction>,
) -> WatchHandle {
    let token = CancellationToken::new();
    let cancel = token.clone();

    let task = tokio::spawn(async move {
        tracing::debug!(%address, "Pending-transaction watch starting");
        loop {
            let outcome = tokio::select! {
                outcome = run_connection(&ws_url, address, &sink, &cancel) => outcome,
                _ = cancel.cancelled() => break,
            };
            match outcome {
                Ok(()) => break,
                Err(e) => {
                    if cancel.is_cancelled() || sink.is_closed() {
                        break;
                    }
                    tracing::warn!(%address, error = %e, delay = ?RECONNECT_DELAY, "Pending watch disconnected, reconnecting");
                    tokio::select! {
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        }
        tracing::debug!(%address, "Pending-transaction watch stopped");
    });

    WatchHandle::new(token, task)
}

fn subscribe_request(address: Address) -> String {
    let address = address.to_checksum(None);
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "eth_subscribe",
        "params": [
            "alchemy_pendingTransactions",
            { "fromAddress": address, "toAddress": address, "hashesOnly": false }
        ]
    })
    .to_string()
}

/// Runs one connection; `Ok` means a clean shutdown.
async fn run_connection(
    url: &Url,
    address: Address,
    sink: &mpsc::Sender<Transaction>,
    cancel: &CancellationToken,
) -> Result<(), ClientError> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| ClientError::Transport(e.to_string()))?;
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(subscribe_request(address)))
        .await
        .map_err(|e| ClientError::Transport(e.to_string()))?;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(tx) = parse_notification(&text) {
                            if sink.send(tx).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write
                            .send(Message::Pong(data))
                            .await
                            .map_err(|e| ClientError::Transport(e.to_string()))?;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(ClientError::Transport("websocket closed".into()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
                }
            }
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Notification {
    params: NotificationParams,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    result: PendingTransaction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingTransaction {
    hash: String,
    from: Address,
    to: Option<Address>,
    value: Option<U256>,
}

/// Subscription notifications become `pending` rows; anything else
/// (the subscription ack, keep-alives) is ignored.
fn parse_notification(text: &str) -> Option<Transaction> {
    let notification: Notification = match serde_json::from_str(text) {
        Ok(n) => n,
        Err(e) => {
            tracing::trace!(error = %e, "Ignoring websocket message");
            return None;
        }
    };
    let pending = notification.params.result;
    Some(Transaction {
        hash: pending.hash.to_lowercase(),
        block_number: 0,
        value: pending.value.map(wei_to_ether),
        from: pending.from,
        to: pending.to,
        status: TxStatus::Pending,
        timestamp: None,
    })
}
