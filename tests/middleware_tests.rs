//! Middleware and identity resolution tests
//!
//! Router-level tests driven with `tower::ServiceExt::oneshot`; no database
//! required.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{routing::get, Router};
use tower::ServiceExt;
use uuid::Uuid;

use microlend_server::middleware::auth::{AdminAuth, AdminToken};
use microlend_server::middleware::security_headers;

async fn guarded(admin: AdminAuth) -> String {
    admin.admin_id.to_string()
}

fn test_app() -> Router {
    Router::new()
        .route("/guarded", get(guarded))
        .with_state(AdminToken("service-secret".to_string()))
        .layer(axum::middleware::from_fn(security_headers))
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let response = test_app()
        .oneshot(Request::builder().uri("/guarded").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/guarded")
                .header("authorization", "Bearer wrong-secret")
                .header("x-admin-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_admin_id_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/guarded")
                .header("authorization", "Bearer service-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_request_resolves_admin_identity() {
    let admin_id = Uuid::new_v4();
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/guarded")
                .header("authorization", "Bearer service-secret")
                .header("x-admin-id", admin_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let response = test_app()
        .oneshot(Request::builder().uri("/guarded").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("content-security-policy"));
}
