// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-address transaction lists, deduplicated by hash.

use std::collections::{HashMap, HashSet};

use alloy::primitives::Address;

use crate::error::ErrorKind;
use crate::models::{Transaction, TxStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionsState {
    pub transactions: HashMap<Address, Vec<Transaction>>,
    pub loading: bool,
    pub error: Option<ErrorKind>,
    history_loaded: HashSet<Address>,
}

impl TransactionsState {
    pub fn for_address(&self, address: &Address) -> &[Transaction] {
        self.transactions
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether the full history of `address` has been fetched.
    pub fn is_loaded(&self, address: &Address) -> bool {
        self.history_loaded.contains(address)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionsAction {
    Loading,
    Error(ErrorKind),
    /// Full history for `address`, newest first.
    HistoryLoaded {
        address: Address,
        transactions: Vec<Transaction>,
    },
    /// One transaction from a live watch or a local send.
    Add {
        address: Address,
        transaction: Transaction,
    },
    /// No fetch is in flight any more; the error is kept.
    Idle,
    /// Forget every address, e.g. on logout.
    Reset,
}

impl TransactionsAction {
    pub fn name(&self) -> &'static str {
        match self {
            TransactionsAction::Loading => "LOADING",
            TransactionsAction::Error(_) => "ERROR",
            TransactionsAction::HistoryLoaded { .. } => "SET_TRANSACTIONS",
            TransactionsAction::Add { .. } => "ADD_TRANSACTION",
            TransactionsAction::Idle => "IDLE",
            TransactionsAction::Reset => "RESET",
        }
    }
}

pub fn reduce(state: &TransactionsState, action: TransactionsAction) -> TransactionsState {
    let mut next = state.clone();

    match action {
        TransactionsAction::Loading => {
            next.loading = true;
            next.error = None;
        }
        TransactionsAction::Error(kind) => {
            next.loading = false;
            next.error = Some(kind);
        }
        TransactionsAction::HistoryLoaded {
            address,
            transactions,
        } => {
            next.loading = false;
            // Live rows that beat the history fetch stay on top.
            let live: Vec<Transaction> = next
                .transactions
                .remove(&address)
                .unwrap_or_default()
                .into_iter()
                .filter(|tx| !transactions.iter().any(|h| h.hash == tx.hash))
                .collect();
            let mut merged = live;
            merged.extend(transactions);
            next.transactions.insert(address, merged);
            next.history_loaded.insert(address);
        }
        TransactionsAction::Add {
            address,
            transaction,
        } => {
            let list = next.transactions.entry(address).or_default();
            list.retain(|tx| tx.hash != transaction.hash);
            let at = list
                .iter()
                .position(|tx| sorts_before(&transaction, tx))
                .unwrap_or(list.len());
            list.insert(at, transaction);
        }
        TransactionsAction::Idle => next.loading = false,
        TransactionsAction::Reset => next = TransactionsState::default(),
    }

    next
}

/// Pending rows first, then descending block. Ties keep arrival order.
fn sorts_before(new: &Transaction, existing: &Transaction) -> bool {
    match (new.status == TxStatus::Pending, existing.status == TxStatus::Pending) {
        (true, _) => true,
        (false, true) => false,
        (false, false) => new.block_number > existing.block_number,
    }
}
