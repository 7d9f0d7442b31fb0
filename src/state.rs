// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::custody::CustodyApi;
use crate::storage::UserDatabase;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserDatabase>,
    /// `None` when no API key is configured; the proxy then answers 503.
    pub custody: Option<Arc<dyn CustodyApi>>,
}

impl AppState {
    pub fn new(users: UserDatabase) -> Self {
        Self {
            users: Arc::new(users),
            custody: None,
        }
    }

    pub fn with_custody(mut self, custody: Arc<dyn CustodyApi>) -> Self {
        self.custody = Some(custody);
        self
    }
}
