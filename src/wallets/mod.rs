// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallets, accounts and the lazily fetched balance of the selected account,
//! plus wallet imports and ETH sends from the selected account.

pub mod state;
pub mod sync;

pub use state::{reduce, WalletsAction, WalletsPhase, WalletsState};
pub use sync::{ImportKind, WalletDeps, WalletSync, DEFAULT_NEW_WALLET_NAME};
