// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the custody provider's server API.
//!
//! Requests are JSON `POST`s stamped with the API key (see [`super::stamp`]).
//! Activity submissions may come back pending; they are polled through
//! `get_activity` until they settle or [`ActivityPolling::max_attempts`] is
//! exhausted.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use super::proxy::{Endpoint, ProxyMethod};
use super::stamp::{ApiKeyStamper, STAMP_HEADER};
use super::types::*;
use super::{CustodyApi, ReadClient};
use crate::config::CustodyConfig;
use crate::error::ClientError;
use crate::models::Authenticator;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const STATUS_COMPLETED: &str = "ACTIVITY_STATUS_COMPLETED";
const STATUS_FAILED: &str = "ACTIVITY_STATUS_FAILED";
const STATUS_REJECTED: &str = "ACTIVITY_STATUS_REJECTED";

const QUERY_LIST_SUBORGS: &str = "/public/v1/query/list_suborgs";
const QUERY_LIST_WALLETS: &str = "/public/v1/query/list_wallets";
const QUERY_GET_WALLET: &str = "/public/v1/query/get_wallet";
const QUERY_LIST_WALLET_ACCOUNTS: &str = "/public/v1/query/list_wallet_accounts";
const QUERY_GET_USER: &str = "/public/v1/query/get_user";
const QUERY_GET_AUTHENTICATORS: &str = "/public/v1/query/get_authenticators";
const QUERY_GET_AUTHENTICATOR: &str = "/public/v1/query/get_authenticator";
const QUERY_GET_ACTIVITY: &str = "/public/v1/query/get_activity";

/// Bounds for waiting on pending activities.
#[derive(Debug, Clone, Copy)]
pub struct ActivityPolling {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ActivityPolling {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(500),
        }
    }
}

pub struct HttpCustodyClient {
    http: reqwest::Client,
    base_url: String,
    organization_id: String,
    stamper: ApiKeyStamper,
    polling: ActivityPolling,
}

impl HttpCustodyClient {
    pub fn new(config: &CustodyConfig) -> Result<Self, ClientError> {
        let stamper = ApiKeyStamper::from_pem(
            &config.api_private_key_pem,
            config.api_public_key.as_deref(),
        )?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            organization_id: config.organization_id.clone(),
            stamper,
            polling: ActivityPolling::default(),
        })
    }

    pub fn with_polling(mut self, polling: ActivityPolling) -> Self {
        self.polling = polling;
        self
    }

    /// Parent organization id used when a request does not name one.
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let bytes = serde_json::to_vec(body)?;
        let stamp = self.stamper.stamp(&bytes)?;

        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, "application/json")
            .header(STAMP_HEADER, stamp)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            tracing::warn!(path, status = status.as_u16(), %message, "Custody request failed");
            return Err(ClientError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
        field: &str,
    ) -> Result<T, ClientError> {
        let response = self.post(path, &body).await?;
        let value = response
            .get(field)
            .cloned()
            .ok_or_else(|| ClientError::Decode(format!("{path}: missing `{field}`")))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Submit an activity and return its result object.
    async fn submit(
        &self,
        endpoint: Endpoint,
        organization_id: &str,
        parameters: Value,
    ) -> Result<Value, ClientError> {
        let Endpoint::Submit {
            path,
            activity_type,
            result_key,
        } = endpoint
        else {
            return Err(ClientError::Precondition(format!(
                "{endpoint:?} is not an activity"
            )));
        };

        let body = json!({
            "type": activity_type,
            "timestampMs": chrono::Utc::now().timestamp_millis().to_string(),
            "organizationId": organization_id,
            "parameters": parameters,
        });
        let response = self.post(path, &body).await?;
        let activity = response
            .get("activity")
            .cloned()
            .ok_or_else(|| ClientError::Decode(format!("{path}: missing `activity`")))?;

        let activity = self.await_activity(activity).await?;
        tracing::debug!(activity_type, organization_id, "Activity completed");

        activity
            .pointer(&format!("/result/{result_key}"))
            .cloned()
            .ok_or_else(|| ClientError::Decode(format!("activity result missing `{result_key}`")))
    }

    async fn await_activity(&self, mut activity: Value) -> Result<Value, ClientError> {
        let mut attempts = 0;
        loop {
            let status = activity
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let id = activity
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            match status.as_str() {
                STATUS_COMPLETED => return Ok(activity),
                STATUS_FAILED | STATUS_REJECTED => {
                    let message = activity
                        .pointer("/failure/message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("activity {id} ended with {status}"));
                    return Err(ClientError::Remote {
                        status: 200,
                        message,
                    });
                }
                _ => {}
            }

            attempts += 1;
            if attempts > self.polling.max_attempts {
                return Err(ClientError::Remote {
                    status: 200,
                    message: format!("activity {id} still {status} after {attempts} polls"),
                });
            }

            tracing::debug!(activity_id = %id, %status, attempts, "Polling pending activity");
            tokio::time::sleep(self.polling.interval).await;

            let organization_id = activity
                .get("organizationId")
                .and_then(Value::as_str)
                .unwrap_or(self.organization_id.as_str())
                .to_string();
            activity = self
                .query(
                    QUERY_GET_ACTIVITY,
                    json!({ "organizationId": organization_id, "activityId": id }),
                    "activity",
                )
                .await?;
        }
    }
}

/// Split a caller-supplied request object into `(organizationId, rest)`.
fn split_organization(request: Value, default_org: &str) -> (String, Value) {
    let mut map = match request {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let organization_id = map
        .remove("organizationId")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| default_org.to_string());
    map.remove("timestampMs");
    map.remove("type");
    (organization_id, Value::Object(map))
}

#[async_trait]
impl ReadClient for HttpCustodyClient {
    async fn wallets(&self, organization_id: &str) -> Result<Vec<WalletSummary>, ClientError> {
        self.query(
            QUERY_LIST_WALLETS,
            json!({ "organizationId": organization_id }),
            "wallets",
        )
        .await
    }

    async fn wallet_accounts(
        &self,
        organization_id: &str,
        wallet_id: &str,
    ) -> Result<Vec<WalletAccountRecord>, ClientError> {
        self.query(
            QUERY_LIST_WALLET_ACCOUNTS,
            json!({ "organizationId": organization_id, "walletId": wallet_id }),
            "accounts",
        )
        .await
    }
}

#[async_trait]
impl CustodyApi for HttpCustodyClient {
    async fn sub_organization_ids(&self, filter: &SubOrgFilter) -> Result<Vec<String>, ClientError> {
        self.query(
            QUERY_LIST_SUBORGS,
            json!({
                "organizationId": self.organization_id,
                "filterType": filter.filter_type(),
                "filterValue": filter.filter_value(),
            }),
            "organizationIds",
        )
        .await
    }

    async fn create_sub_organization(
        &self,
        request: &CreateSubOrganization,
    ) -> Result<CreatedSubOrganization, ClientError> {
        let result = self
            .submit(
                ProxyMethod::CreateSubOrganization.endpoint(),
                &self.organization_id,
                request.parameters(),
            )
            .await?;
        let created: CreatedSubOrganization = serde_json::from_value(result)?;
        tracing::info!(
            sub_organization_id = %created.sub_organization_id,
            "Created sub-organization"
        );
        Ok(created)
    }

    async fn email_auth(&self, request: &EmailAuthRequest) -> Result<EmailAuthResult, ClientError> {
        let result = self
            .submit(
                ProxyMethod::EmailAuth.endpoint(),
                &request.organization_id,
                request.parameters(),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn oauth(&self, request: &OAuthRequest) -> Result<OAuthResult, ClientError> {
        let result = self
            .submit(
                ProxyMethod::OAuth.endpoint(),
                &request.organization_id,
                request.parameters(),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn user(&self, organization_id: &str, user_id: &str) -> Result<ProviderUser, ClientError> {
        self.query(
            QUERY_GET_USER,
            json!({ "organizationId": organization_id, "userId": user_id }),
            "user",
        )
        .await
    }

    async fn wallet(
        &self,
        organization_id: &str,
        wallet_id: &str,
    ) -> Result<WalletSummary, ClientError> {
        self.query(
            QUERY_GET_WALLET,
            json!({ "organizationId": organization_id, "walletId": wallet_id }),
            "wallet",
        )
        .await
    }

    async fn authenticators(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<Vec<Authenticator>, ClientError> {
        let records: Vec<AuthenticatorRecord> = self
            .query(
                QUERY_GET_AUTHENTICATORS,
                json!({ "organizationId": organization_id, "userId": user_id }),
                "authenticators",
            )
            .await?;
        Ok(records.into_iter().map(Authenticator::from).collect())
    }

    async fn authenticator(
        &self,
        organization_id: &str,
        authenticator_id: &str,
    ) -> Result<Authenticator, ClientError> {
        let record: AuthenticatorRecord = self
            .query(
                QUERY_GET_AUTHENTICATOR,
                json!({ "organizationId": organization_id, "authenticatorId": authenticator_id }),
                "authenticator",
            )
            .await?;
        Ok(record.into())
    }

    async fn forward(&self, method: ProxyMethod, request: Value) -> Result<Value, ClientError> {
        let (organization_id, rest) = split_organization(request, &self.organization_id);
        match method.endpoint() {
            Endpoint::Query { path } => {
                let mut body = rest;
                body["organizationId"] = Value::String(organization_id);
                self.post(path, &body).await
            }
            endpoint @ Endpoint::Submit { .. } => {
                self.submit(endpoint, &organization_id, rest).await
            }
        }
    }
}
