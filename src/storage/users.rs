// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Email Verification Store backed by redb.
//!
//! ## Table Layout
//!
//! - `users`: normalised email → serialized [`UserRecord`] (JSON bytes)

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{StoreError, StoreResult};
use crate::models::{Email, UserRecord};

// =============================================================================
// Table Definitions
// =============================================================================

/// email → serialized UserRecord.
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

// =============================================================================
// UserDatabase
// =============================================================================

pub struct UserDatabase {
    db: Database,
}

impl UserDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so read transactions never fail on a fresh file
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert a new, unverified record.
    ///
    /// The email is the primary key; a second insert for the same email fails
    /// with [`StoreError::AlreadyExists`] and leaves the first row untouched.
    pub fn add_user(&self, email: &Email, sub_organization_id: &str) -> StoreResult<UserRecord> {
        let record = UserRecord {
            email: email.clone(),
            sub_organization_id: sub_organization_id.to_string(),
            email_verified: false,
        };
        let json = serde_json::to_vec(&record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            let exists = table.get(email.as_str())?.is_some();
            if exists {
                return Err(StoreError::AlreadyExists(email.to_string()));
            }
            table.insert(email.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;

        tracing::info!(email = %email, sub_organization_id, "Stored new user record");
        Ok(record)
    }

    pub fn find_by_email(&self, email: &Email) -> StoreResult<Option<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(email.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Mark the email as verified.
    ///
    /// Verification is monotonic: an already-verified record is returned
    /// unchanged and nothing ever clears the flag.
    pub fn verify_email(&self, email: &Email) -> StoreResult<UserRecord> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut table = write_txn.open_table(USERS)?;
            let mut record: UserRecord = match table.get(email.as_str())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound(email.to_string())),
            };

            if !record.email_verified {
                record.email_verified = true;
                let json = serde_json::to_vec(&record)?;
                table.insert(email.as_str(), json.as_slice())?;
                tracing::info!(email = %email, "Email verified");
            }
            record
        };
        write_txn.commit()?;

        Ok(record)
    }

    /// Cheap read used by the readiness check.
    pub fn check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERS)?;
        Ok(())
    }
}
