// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Email Verification Store endpoints.

use axum::{extract::State, Json};

use crate::error::ApiError;
use crate::models::{AddUserRequest, Email, EmailRequest, UserEnvelope};
use crate::state::AppState;
use crate::storage::StoreError;

const NO_EMAIL: &str = "No email address provided.";

fn required_email(raw: Option<&str>) -> Result<Email, ApiError> {
    let raw = raw.map(str::trim).filter(|e| !e.is_empty());
    let raw = raw.ok_or_else(|| ApiError::bad_request(NO_EMAIL))?;
    Email::parse(raw).map_err(|e| ApiError::bad_request(format!("Invalid email address: {e}")))
}

/// Record a new email with its sub-organization, unverified.
#[utoipa::path(
    post,
    path = "/add-user",
    tag = "Users",
    request_body = AddUserRequest,
    responses(
        (status = 200, description = "User recorded", body = UserEnvelope),
        (status = 400, description = "Email or sub-organization id missing"),
        (status = 500, description = "Persistence failure (including duplicates)")
    )
)]
pub async fn add_user(
    State(state): State<AppState>,
    Json(request): Json<AddUserRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let email = required_email(request.email.as_deref())?;
    let sub_organization_id = request
        .sub_organization_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("No sub-organization id provided."))?;

    let user = state
        .users
        .add_user(&email, sub_organization_id)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to add user");
            ApiError::internal(format!("Failed to add user: {e}"))
        })?;

    tracing::info!(%sub_organization_id, "User added");
    Ok(Json(UserEnvelope { user: Some(user) }))
}

/// Look up the record for an email; the envelope is empty when none exists.
#[utoipa::path(
    post,
    path = "/find-user-by-email",
    tag = "Users",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Stored record, if any", body = UserEnvelope),
        (status = 400, description = "Email missing or malformed")
    )
)]
pub async fn find_user_by_email(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let email = required_email(request.email.as_deref())?;
    let user = state.users.find_by_email(&email).map_err(|e| {
        tracing::error!(error = %e, "User lookup failed");
        ApiError::internal(format!("Failed to find user: {e}"))
    })?;
    Ok(Json(UserEnvelope { user }))
}

/// Mark an email verified. Verification is permanent.
#[utoipa::path(
    post,
    path = "/verify-user-email",
    tag = "Users",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Verified record", body = UserEnvelope),
        (status = 400, description = "Email missing or unknown"),
        (status = 500, description = "Persistence failure")
    )
)]
pub async fn verify_user_email(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let email = required_email(request.email.as_deref())?;
    let user = state.users.verify_email(&email).map_err(|e| match e {
        StoreError::NotFound(_) => {
            ApiError::bad_request(format!("Unable to verify user email {email}: {e}"))
        }
        other => {
            tracing::error!(error = %other, "Email verification failed");
            ApiError::internal(format!("Unable to verify user email {email}: {other}"))
        }
    })?;

    tracing::info!(sub_organization_id = %user.sub_organization_id, "Email verified");
    Ok(Json(UserEnvelope { user: Some(user) }))
}
