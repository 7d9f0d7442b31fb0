// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded Wallet - session controllers and email verification service
//!
//! The library drives an embedded-wallet client on top of a wallet-custody
//! provider: the auth state machine, wallet and transaction synchronisation,
//! and the clients for the provider, the chain-data provider and the price
//! feed. The binary serves the Email Verification Store and the allow-listed
//! custody proxy.
//!
//! ## Modules
//!
//! - `auth` - Login flows and the auth state machine
//! - `wallets` - Wallet listing, selection and balance
//! - `transactions` - History plus live mined/pending watches
//! - `session` - Wires the controllers to the signed-in user
//! - `custody` - Custody provider API (stamping, proxy allow-list)
//! - `chain` - Chain-data provider (balances, transfers, watches)
//! - `price` - Fiat price feed
//! - `directory` - Client for the verification service
//! - `storage` - redb-backed verification and preference stores
//! - `api` - HTTP API handlers (Axum)

pub mod api;
pub mod auth;
pub mod chain;
pub mod config;
pub mod custody;
pub mod directory;
pub mod error;
pub mod logging;
pub mod magic_link;
pub mod models;
pub mod price;
pub mod session;
pub mod state;
pub mod storage;
pub mod transactions;
pub mod wallets;

#[cfg(test)]
pub(crate) mod testing;
