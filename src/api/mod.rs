// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    custody::ProxyRequest,
    models::{AddUserRequest, EmailRequest, UserEnvelope, UserRecord},
    state::AppState,
};

pub mod health;
pub mod proxy;
pub mod users;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(proxy::welcome).post(proxy::proxy))
        .route("/add-user", post(users::add_user))
        .route("/find-user-by-email", post(users::find_user_by_email))
        .route("/verify-user-email", post(users::verify_user_email))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        proxy::welcome,
        proxy::proxy,
        users::add_user,
        users::find_user_by_email,
        users::verify_user_email,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            UserRecord,
            AddUserRequest,
            EmailRequest,
            UserEnvelope,
            ProxyRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Proxy", description = "Allow-listed custody provider calls"),
        (name = "Users", description = "Email verification store"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::storage::UserDatabase;
    use crate::testing::FakeCustody;

    fn state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let users = UserDatabase::open(&dir.path().join("users.redb")).unwrap();
        let state = AppState::new(users).with_custody(Arc::new(FakeCustody::new()));
        (state, dir)
    }

    async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn welcome_is_plain_text() {
        let (state, _dir) = state();
        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], proxy::WELCOME.as_bytes());
    }

    #[tokio::test]
    async fn add_find_verify_lifecycle() {
        let (state, _dir) = state();
        let app = router(state);

        let (status, body) = post_json(
            &app,
            "/add-user",
            json!({"email": "New@Example.com", "subOrganizationId": "sub-1"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "new@example.com");
        assert_eq!(body["user"]["emailVerified"], false);

        let (status, body) =
            post_json(&app, "/find-user-by-email", json!({"email": "new@example.com"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["subOrganizationId"], "sub-1");

        let (status, body) =
            post_json(&app, "/verify-user-email", json!({"email": "new@example.com"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["emailVerified"], true);
    }

    #[tokio::test]
    async fn unknown_email_finds_nothing() {
        let (state, _dir) = state();
        let app = router(state);
        let (status, body) =
            post_json(&app, "/find-user-by-email", json!({"email": "nobody@example.com"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn missing_email_is_rejected() {
        let (state, _dir) = state();
        let app = router(state);
        for path in ["/add-user", "/find-user-by-email", "/verify-user-email"] {
            let (status, body) = post_json(&app, path, json!({})).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
            assert_eq!(body["error"], "No email address provided.");
        }
    }

    #[tokio::test]
    async fn duplicate_add_is_a_server_error() {
        let (state, _dir) = state();
        let app = router(state);
        let body = json!({"email": "dup@example.com", "subOrganizationId": "sub-1"});
        post_json(&app, "/add-user", body.clone()).await;

        let (status, response) = post_json(&app, "/add-user", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to add user"));
    }

    #[tokio::test]
    async fn verifying_unknown_email_is_a_bad_request() {
        let (state, _dir) = state();
        let app = router(state);
        let (status, body) =
            post_json(&app, "/verify-user-email", json!({"email": "ghost@example.com"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Unable to verify user email ghost@example.com"));
    }

    #[tokio::test]
    async fn proxy_forwards_allow_listed_methods() {
        let (state, _dir) = state();
        let app = router(state);
        let (status, body) = post_json(
            &app,
            "/",
            json!({"methodName": "getSubOrgIds", "params": [{"filterType": "EMAIL"}]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["method"], "getSubOrgIds");
        assert_eq!(body["request"]["filterType"], "EMAIL");
    }

    #[tokio::test]
    async fn proxy_rejects_other_methods() {
        let (state, _dir) = state();
        let app = router(state);
        for method in ["createWallet", "signTransaction", ""] {
            let (status, body) =
                post_json(&app, "/", json!({"methodName": method, "params": []})).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{method}");
            assert_eq!(body["error"], "Method not allowed");
        }
    }

    #[tokio::test]
    async fn proxy_without_credentials_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let users = UserDatabase::open(&dir.path().join("users.redb")).unwrap();
        let app = router(AppState::new(users));

        let (status, _) =
            post_json(&app, "/", json!({"methodName": "emailAuth", "params": [{}]})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn readiness_reports_components() {
        let (state, _dir) = state();
        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["database"], "ok");
        assert_eq!(body["checks"]["custody"], "ok");
    }
}
