//! Router-level tests: liveness and the authentication boundary.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use readnwin_api::{
    app_router,
    auth::{issue_token, Claims},
    config::AppConfig,
    events::EventSender,
    handlers::AppServices,
    services::GatewaySettings,
    AppState,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_64_chars_long_padding!";

/// App state over a disconnected database: only routes that never reach the
/// database are exercised here.
fn test_state() -> Arc<AppState> {
    let config = AppConfig::new(
        "sqlite::memory:".to_string(),
        JWT_SECRET.to_string(),
        "127.0.0.1".to_string(),
        0,
        "test".to_string(),
    );
    let db = Arc::new(DatabaseConnection::default());
    let (event_tx, _event_rx) = mpsc::channel(16);
    let event_sender = EventSender::new(event_tx);
    let services = AppServices::new(
        db.clone(),
        Arc::new(event_sender.clone()),
        Arc::new(GatewaySettings::new()),
        &config,
    );
    Arc::new(AppState { db, config, event_sender, services })
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = app_router(test_state());
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn checkout_endpoints_require_authentication() {
    for (method, uri) in [
        ("POST", "/api/orders"),
        ("GET", "/api/cart"),
        ("POST", "/api/cart/transfer-guest"),
        ("POST", "/api/payment/create-intent"),
        ("POST", "/api/payment/flutterwave/initialize"),
    ] {
        let app = app_router(test_state());
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], serde_json::json!(false));
    }
}

#[tokio::test]
async fn a_garbage_bearer_token_is_rejected() {
    let app = app_router(test_state());
    let request = Request::get("/api/cart")
        .header("authorization", "Bearer not.a.token")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn a_valid_token_passes_the_auth_boundary() {
    // The database behind this state is disconnected, so getting past
    // authentication surfaces as an internal error rather than a 401.
    let claims = Claims {
        sub: Uuid::new_v4(),
        email: "reader@example.com".to_string(),
        name: None,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    let token = issue_token(&claims, JWT_SECRET).expect("token");

    let app = app_router(test_state());
    let request = Request::get("/api/cart")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
