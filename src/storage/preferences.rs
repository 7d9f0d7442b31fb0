// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable client-side preferences.
//!
//! Holds the `(userId, walletId)` pair of the wallet the user last selected,
//! under a single constant key.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::StoreResult;
use crate::models::PreferredWallet;

/// key → JSON value.
const PREFERENCES: TableDefinition<&str, &[u8]> = TableDefinition::new("preferences");

pub const PREFERRED_WALLET_KEY: &str = "preferred-wallet";

pub struct PreferenceStore {
    db: Database,
}

impl PreferenceStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PREFERENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub fn preferred_wallet(&self) -> StoreResult<Option<PreferredWallet>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PREFERENCES)?;
        match table.get(PREFERRED_WALLET_KEY)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn set_preferred_wallet(&self, preference: &PreferredWallet) -> StoreResult<()> {
        let json = serde_json::to_vec(preference)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PREFERENCES)?;
            table.insert(PREFERRED_WALLET_KEY, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// The preferred wallet id, but only if it was stored for `user_id`.
    pub fn preferred_wallet_for(&self, user_id: &str) -> StoreResult<Option<String>> {
        Ok(self
            .preferred_wallet()?
            .filter(|p| p.user_id == user_id)
            .map(|p| p.wallet_id))
    }
}
