// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Chain-Data Provider
//!
//! Balances, historical transfers and live transaction watches for the
//! user's addresses.
//!
//! ## Strategy
//!
//! 1. **History**: two `alchemy_getAssetTransfers` queries per address (one
//!    with `fromAddress`, one with `toAddress`), run concurrently, merged and
//!    sorted by descending block number.
//! 2. **Mined watch**: polls the head block and queries transfers in the new
//!    range, the same way the history is built.
//! 3. **Pending watch**: optional `alchemy_pendingTransactions` websocket
//!    subscription.
//! 4. **Sending**: the node fills an unsigned EIP-1559 transfer, the custody
//!    provider signs it, and the raw bytes are broadcast here.
//!
//! Every watch returns a [`WatchHandle`]; dropping or releasing the handle
//! stops the background task.

use alloy::consensus::{SignableTransaction, TxEip1559};
use alloy::primitives::{utils::format_units, Address, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ClientError;
use crate::models::{Transaction, TxStatus};

pub mod client;
pub mod history;
pub mod pending;
pub mod watch;

pub use client::AlchemyClient;
pub use history::{fetch_history, merge_transfers};
pub use pending::watch_pending_transactions;
pub use watch::{watch_mined_transactions, WatchHandle, DEFAULT_POLL_INTERVAL};

/// Transfer categories included in history queries.
pub const TRANSFER_CATEGORIES: [&str; 3] = ["erc20", "external", "internal"];

#[async_trait]
pub trait ChainData: Send + Sync {
    async fn balance(&self, address: Address) -> Result<U256, ClientError>;

    async fn block_number(&self) -> Result<u64, ClientError>;

    async fn asset_transfers(&self, query: &TransferQuery) -> Result<Vec<AssetTransfer>, ClientError>;

    /// Unsigned EIP-1559 transfer of `value` wei with chain id, nonce, gas
    /// and fees filled in from the node. Read-only clients keep the default.
    async fn prepare_transfer(
        &self,
        _from: Address,
        _to: Address,
        _value: U256,
    ) -> Result<TxEip1559, ClientError> {
        Err(ClientError::Precondition("chain client cannot send transactions".into()))
    }

    /// Broadcast a signed, EIP-2718 encoded transaction.
    async fn send_raw_transaction(&self, _signed: &[u8]) -> Result<B256, ClientError> {
        Err(ClientError::Precondition("chain client cannot send transactions".into()))
    }
}

/// Hex payload handed to a remote signer: type byte plus RLP fields, no `0x`.
pub fn unsigned_payload(tx: &TxEip1559) -> String {
    alloy::hex::encode(tx.encoded_for_signing())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// `fromAddress` filter; rows are tagged `sent`.
    Outbound,
    /// `toAddress` filter; rows are tagged `received`.
    Inbound,
}

impl TransferDirection {
    pub fn status(&self) -> TxStatus {
        match self {
            TransferDirection::Outbound => TxStatus::Sent,
            TransferDirection::Inbound => TxStatus::Received,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferQuery {
    pub address: Address,
    pub direction: TransferDirection,
    pub from_block: Option<u64>,
}

impl TransferQuery {
    pub fn outbound(address: Address) -> Self {
        Self {
            address,
            direction: TransferDirection::Outbound,
            from_block: None,
        }
    }

    pub fn inbound(address: Address) -> Self {
        Self {
            address,
            direction: TransferDirection::Inbound,
            from_block: None,
        }
    }

    pub fn since(mut self, block: u64) -> Self {
        self.from_block = Some(block);
        self
    }

    /// `alchemy_getAssetTransfers` parameter object.
    pub fn params(&self, page_key: Option<&str>) -> Value {
        let mut params = json!({
            "fromBlock": format!("{:#x}", self.from_block.unwrap_or(0)),
            "toBlock": "latest",
            "category": TRANSFER_CATEGORIES,
            "withMetadata": true,
            "excludeZeroValue": false,
        });
        let key = match self.direction {
            TransferDirection::Outbound => "fromAddress",
            TransferDirection::Inbound => "toAddress",
        };
        params[key] = json!(self.address.to_checksum(None));
        if let Some(page_key) = page_key {
            params["pageKey"] = json!(page_key);
        }
        params
    }
}

/// Validated transfer row.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetTransfer {
    pub block_number: u64,
    pub hash: String,
    pub from: Address,
    pub to: Option<Address>,
    pub value: Option<f64>,
    pub asset: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl AssetTransfer {
    pub fn into_transaction(self, status: TxStatus) -> Transaction {
        Transaction {
            hash: self.hash,
            block_number: self.block_number,
            value: self.value,
            from: self.from,
            to: self.to,
            status,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransferMetadata {
    block_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTransfer {
    block_num: String,
    hash: String,
    from: Address,
    to: Option<Address>,
    value: Option<f64>,
    asset: Option<String>,
    metadata: Option<RawTransferMetadata>,
}

impl TryFrom<RawTransfer> for AssetTransfer {
    type Error = ClientError;

    fn try_from(raw: RawTransfer) -> Result<Self, Self::Error> {
        let block_number = parse_hex_u64(&raw.block_num)?;
        let timestamp = raw
            .metadata
            .and_then(|m| m.block_timestamp)
            .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
            .map(|ts| ts.with_timezone(&Utc));
        Ok(AssetTransfer {
            block_number,
            hash: raw.hash.to_lowercase(),
            from: raw.from,
            to: raw.to,
            value: raw.value,
            asset: raw.asset,
            timestamp,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTransferPage {
    pub transfers: Vec<RawTransfer>,
    pub page_key: Option<String>,
}

pub(crate) fn parse_hex_u64(raw: &str) -> Result<u64, ClientError> {
    let digits = raw.trim_start_matches("0x");
    u64::from_str_radix(digits, 16)
        .map_err(|e| ClientError::Decode(format!("block number `{raw}`: {e}")))
}

/// Wei to ether as a float, for display.
pub fn wei_to_ether(wei: U256) -> f64 {
    format_units(wei, "ether")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}
