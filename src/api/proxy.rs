// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `POST /`: forwards allow-listed calls to the custody provider.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;

use crate::custody::{ProxyMethod, ProxyRequest};
use crate::error::{ApiError, ClientError};
use crate::state::AppState;

pub const WELCOME: &str = "Embedded wallet proxy is running.";

#[utoipa::path(
    get,
    path = "/",
    tag = "Proxy",
    responses((status = 200, description = "Plain-text welcome", body = String))
)]
pub async fn welcome() -> &'static str {
    WELCOME
}

fn upstream_error(e: ClientError) -> ApiError {
    match e {
        ClientError::Remote { status, message } if (400..500).contains(&status) => {
            ApiError::new(
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST),
                message,
            )
        }
        ClientError::Remote { message, .. } => ApiError::bad_gateway(message),
        other => ApiError::bad_gateway(other.to_string()),
    }
}

/// Forward one allow-listed provider call, stamped with the service API key.
#[utoipa::path(
    post,
    path = "/",
    tag = "Proxy",
    request_body = ProxyRequest,
    responses(
        (status = 200, description = "Provider result"),
        (status = 403, description = "Method not allowed"),
        (status = 502, description = "Provider failure"),
        (status = 503, description = "No provider credentials configured")
    )
)]
pub async fn proxy(
    State(state): State<AppState>,
    Json(request): Json<ProxyRequest>,
) -> Result<Json<Value>, ApiError> {
    let method: ProxyMethod = request.method_name.parse().map_err(|e| {
        tracing::warn!(error = %e, "Rejected proxy call");
        ApiError::forbidden("Method not allowed")
    })?;

    let custody = state.custody.as_ref().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Custody provider is not configured",
        )
    })?;

    let result = custody
        .forward(method, request.request_object())
        .await
        .map_err(|e| {
            tracing::warn!(%method, error = %e, "Proxied call failed");
            upstream_error(e)
        })?;

    tracing::debug!(%method, "Proxied call succeeded");
    Ok(Json(result))
}
