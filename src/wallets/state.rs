// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallets state and reducer.
//!
//! Selection is stored as ids into `wallets`, so the selected account is
//! always an element of the selected wallet. Selecting a wallet moves the
//! account selection to that wallet's first account.

use alloy::primitives::{Address, U256};

use crate::error::ErrorKind;
use crate::models::{Account, Wallet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletsPhase {
    Empty,
    Loading,
    Populated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletsState {
    pub loading: bool,
    pub error: Option<ErrorKind>,
    pub wallets: Vec<Wallet>,
    selected_wallet: Option<String>,
    selected_account: Option<Address>,
}

impl WalletsState {
    pub fn phase(&self) -> WalletsPhase {
        if self.loading {
            WalletsPhase::Loading
        } else if self.wallets.is_empty() {
            WalletsPhase::Empty
        } else {
            WalletsPhase::Populated
        }
    }

    pub fn selected_wallet(&self) -> Option<&Wallet> {
        let id = self.selected_wallet.as_deref()?;
        self.wallets.iter().find(|w| w.wallet_id == id)
    }

    pub fn selected_account(&self) -> Option<&Account> {
        let address = self.selected_account?;
        self.selected_wallet()?
            .accounts
            .iter()
            .find(|a| a.address == address)
    }

    pub fn selected_address(&self) -> Option<Address> {
        self.selected_account().map(|a| a.address)
    }

    fn select_wallet(&mut self, wallet_id: &str) -> bool {
        let Some(wallet) = self.wallets.iter().find(|w| w.wallet_id == wallet_id) else {
            return false;
        };
        self.selected_account = wallet.accounts.first().map(|a| a.address);
        self.selected_wallet = Some(wallet.wallet_id.clone());
        self.clear_selected_balance();
        true
    }

    fn selected_account_mut(&mut self) -> Option<&mut Account> {
        let address = self.selected_account?;
        let id = self.selected_wallet.as_deref()?;
        self.wallets
            .iter_mut()
            .find(|w| w.wallet_id == id)?
            .accounts
            .iter_mut()
            .find(|a| a.address == address)
    }

    fn clear_selected_balance(&mut self) {
        if let Some(account) = self.selected_account_mut() {
            account.balance = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletsAction {
    Loading,
    Error(ErrorKind),
    /// Fresh collection; `preferred` is honoured only if still present.
    Loaded {
        wallets: Vec<Wallet>,
        preferred: Option<String>,
    },
    SelectWallet(String),
    SelectAccount(Address),
    /// Balance fetched for `address`; dropped unless it is still selected.
    BalanceFetched { address: Address, balance: U256 },
    /// Newly created wallet; appended and selected.
    WalletAdded(Wallet),
    AccountAdded { wallet_id: String, account: Account },
    Reset,
}

impl WalletsAction {
    pub fn name(&self) -> &'static str {
        match self {
            WalletsAction::Loading => "LOADING",
            WalletsAction::Error(_) => "ERROR",
            WalletsAction::Loaded { .. } => "LOADED",
            WalletsAction::SelectWallet(_) => "SELECT_WALLET",
            WalletsAction::SelectAccount(_) => "SELECT_ACCOUNT",
            WalletsAction::BalanceFetched { .. } => "BALANCE_FETCHED",
            WalletsAction::WalletAdded(_) => "ADD_WALLET",
            WalletsAction::AccountAdded { .. } => "ADD_ACCOUNT",
            WalletsAction::Reset => "RESET",
        }
    }
}

pub fn reduce(state: &WalletsState, action: WalletsAction) -> WalletsState {
    let mut next = state.clone();

    match action {
        WalletsAction::Loading => {
            next.loading = true;
            next.error = None;
        }
        WalletsAction::Error(kind) => {
            next.loading = false;
            next.error = Some(kind);
        }
        WalletsAction::Loaded { wallets, preferred } => {
            next.loading = false;
            next.wallets = wallets;
            next.selected_wallet = None;
            next.selected_account = None;

            let preferred = preferred.filter(|id| next.wallets.iter().any(|w| &w.wallet_id == id));
            if let Some(id) = preferred.or_else(|| next.wallets.first().map(|w| w.wallet_id.clone())) {
                next.select_wallet(&id);
            }
        }
        WalletsAction::SelectWallet(wallet_id) => {
            if !next.select_wallet(&wallet_id) {
                tracing::warn!(%wallet_id, "Selected wallet is not in the collection");
            }
        }
        WalletsAction::SelectAccount(address) => {
            let in_wallet = next
                .selected_wallet()
                .is_some_and(|w| w.accounts.iter().any(|a| a.address == address));
            if in_wallet {
                next.selected_account = Some(address);
                next.clear_selected_balance();
            } else {
                tracing::warn!(%address, "Selected account is not in the selected wallet");
            }
        }
        WalletsAction::BalanceFetched { address, balance } => {
            if next.selected_account == Some(address) {
                if let Some(account) = next.selected_account_mut() {
                    account.balance = Some(balance);
                }
            } else {
                tracing::debug!(%address, "Discarding balance for deselected account");
            }
        }
        WalletsAction::WalletAdded(wallet) => {
            next.loading = false;
            let id = wallet.wallet_id.clone();
            next.wallets.push(wallet);
            next.select_wallet(&id);
        }
        WalletsAction::AccountAdded { wallet_id, account } => {
            next.loading = false;
            match next.wallets.iter_mut().find(|w| w.wallet_id == wallet_id) {
                Some(wallet) => wallet.accounts.push(account),
                None => tracing::warn!(%wallet_id, "New account for unknown wallet"),
            }
        }
        WalletsAction::Reset => next = WalletsState::default(),
    }

    next
}
