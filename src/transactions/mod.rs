// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction history and live updates, keyed by address.

pub mod state;
pub mod sync;

pub use state::{reduce, TransactionsAction, TransactionsState};
pub use sync::TransactionSync;
