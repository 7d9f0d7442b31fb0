// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-address transaction history.

use std::collections::HashSet;

use alloy::primitives::Address;

use super::{AssetTransfer, ChainData, TransferDirection, TransferQuery};
use crate::error::ClientError;
use crate::models::Transaction;

/// Full history of `address`: outbound and inbound transfers fetched
/// concurrently, merged newest first.
pub async fn fetch_history<C: ChainData + ?Sized>(
    chain: &C,
    address: Address,
) -> Result<Vec<Transaction>, ClientError> {
    fetch_range(chain, address, None).await
}

/// Transfers from `from_block` onwards (or all of them).
pub(crate) async fn fetch_range<C: ChainData + ?Sized>(
    chain: &C,
    address: Address,
    from_block: Option<u64>,
) -> Result<Vec<Transaction>, ClientError> {
    let mut outbound = TransferQuery::outbound(address);
    let mut inbound = TransferQuery::inbound(address);
    outbound.from_block = from_block;
    inbound.from_block = from_block;

    let (sent, received) = tokio::try_join!(
        chain.asset_transfers(&outbound),
        chain.asset_transfers(&inbound)
    )?;
    Ok(merge_transfers(sent, received))
}

/// Tag, merge and sort two directional result sets.
///
/// Rows are sorted by descending block number; the sort is stable, so rows of
/// the same block keep outbound-then-inbound order. A hash present in both
/// sets (a self-transfer) is kept once, as `sent`.
pub fn merge_transfers(sent: Vec<AssetTransfer>, received: Vec<AssetTransfer>) -> Vec<Transaction> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Transaction> = sent
        .into_iter()
        .map(|t| t.into_transaction(TransferDirection::Outbound.status()))
        .chain(
            received
                .into_iter()
                .map(|t| t.into_transaction(TransferDirection::Inbound.status())),
        )
        .filter(|tx| seen.insert(tx.hash.clone()))
        .collect();

    merged.sort_by(|a, b| b.block_number.cmp(&a.block_number));
    merged
}
