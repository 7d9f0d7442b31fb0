// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Passkey (authenticator) management for the signed-in user.

use std::sync::Arc;

use crate::custody::{CustodyApi, PasskeyClient};
use crate::error::ClientError;
use crate::models::{Authenticator, User};

pub struct AuthenticatorManager {
    custody: Arc<dyn CustodyApi>,
    passkeys: Arc<dyn PasskeyClient>,
}

impl AuthenticatorManager {
    pub fn new(custody: Arc<dyn CustodyApi>, passkeys: Arc<dyn PasskeyClient>) -> Self {
        Self { custody, passkeys }
    }

    pub async fn list(&self, user: &User) -> Result<Vec<Authenticator>, ClientError> {
        self.custody
            .authenticators(&user.organization.organization_id, &user.user_id)
            .await
    }

    /// Run a registration ceremony and attach the new passkey to `user`.
    pub async fn add(&self, user: &User, name: &str) -> Result<Authenticator, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::Precondition("passkey name is empty".into()));
        }

        let organization_id = &user.organization.organization_id;
        let credential = self
            .passkeys
            .create_user_passkey(name, &user.username)
            .await?;
        let authenticator_id = self
            .passkeys
            .create_authenticator(organization_id, &user.user_id, name, &credential)
            .await?;
        tracing::info!(%authenticator_id, "Passkey added");

        self.custody
            .authenticator(organization_id, &authenticator_id)
            .await
    }

    /// Remove one passkey. The last remaining one cannot be removed.
    pub async fn remove(&self, user: &User, authenticator_id: &str) -> Result<(), ClientError> {
        let current = self.list(user).await?;
        if !current.iter().any(|a| a.authenticator_id == authenticator_id) {
            return Err(ClientError::NotFound(format!(
                "authenticator not found in organization: {authenticator_id}"
            )));
        }
        if current.len() <= 1 {
            return Err(ClientError::Precondition(
                "cannot remove the last authenticator".into(),
            ));
        }

        self.passkeys
            .delete_authenticators(
                &user.organization.organization_id,
                &user.user_id,
                &[authenticator_id.to_string()],
            )
            .await?;
        tracing::info!(%authenticator_id, "Passkey removed");
        Ok(())
    }
}
