// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Email Verification Store, as seen by the auth controller.
//!
//! [`HttpUserDirectory`] talks to the service's three endpoints;
//! [`UserDatabase`] implements the same trait in-process.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::ClientError;
use crate::models::{Email, UserEnvelope, UserRecord};
use crate::storage::{StoreError, UserDatabase};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn add_user(&self, email: &Email, sub_organization_id: &str)
        -> Result<UserRecord, ClientError>;

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<UserRecord>, ClientError>;

    async fn verify_user_email(&self, email: &Email) -> Result<UserRecord, ClientError>;
}

pub struct HttpUserDirectory {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpUserDirectory {
    pub fn new(base_url: Url) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    async fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<UserEnvelope, ClientError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.error)
            .unwrap_or_else(|_| status.to_string());
        Err(match status {
            StatusCode::BAD_REQUEST if endpoint == "verify-user-email" => {
                ClientError::NotFound(message)
            }
            _ => ClientError::Remote {
                status: status.as_u16(),
                message,
            },
        })
    }
}

fn missing_user(endpoint: &str) -> ClientError {
    ClientError::Decode(format!("{endpoint}: response carries no user"))
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn add_user(
        &self,
        email: &Email,
        sub_organization_id: &str,
    ) -> Result<UserRecord, ClientError> {
        self.post(
            "add-user",
            json!({ "email": email, "subOrganizationId": sub_organization_id }),
        )
        .await?
        .user
        .ok_or_else(|| missing_user("add-user"))
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<UserRecord>, ClientError> {
        Ok(self
            .post("find-user-by-email", json!({ "email": email }))
            .await?
            .user)
    }

    async fn verify_user_email(&self, email: &Email) -> Result<UserRecord, ClientError> {
        self.post("verify-user-email", json!({ "email": email }))
            .await?
            .user
            .ok_or_else(|| missing_user("verify-user-email"))
    }
}

impl From<StoreError> for ClientError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ClientError::NotFound(what),
            other => ClientError::Remote {
                status: 500,
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl UserDirectory for UserDatabase {
    async fn add_user(
        &self,
        email: &Email,
        sub_organization_id: &str,
    ) -> Result<UserRecord, ClientError> {
        Ok(UserDatabase::add_user(self, email, sub_organization_id)?)
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<UserRecord>, ClientError> {
        Ok(self.find_by_email(email)?)
    }

    async fn verify_user_email(&self, email: &Email) -> Result<UserRecord, ClientError> {
        Ok(self.verify_email(email)?)
    }
}
