//! ReadnWin checkout & payment API
//!
//! Order assembly and payment-gateway dispatch for the ReadnWin bookstore:
//! cart snapshotting, pricing (shipping/tax/discount), order persistence
//! and routing to the configured payment gateways.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod services;

use axum::{http::HeaderValue, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use utoipa::ToSchema;
use utoipa_swagger_ui::SwaggerUi;

use utoipa::OpenApi;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Common success wrapper for endpoints without a bespoke shape.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), message: None }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self { success: true, data: None, message: Some(message.into()) }
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "readnwin-api",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

/// Build the application router with middleware and documentation mounted.
pub fn app_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .merge(handlers::api_router())
        .with_state(state)
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_response_success_shape() {
        let body = serde_json::to_value(ApiResponse::success(json!({"n": 1}))).unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["n"], json!(1));
        assert!(body.get("message").is_none());
    }

    #[test]
    fn api_response_message_shape() {
        let body =
            serde_json::to_value(ApiResponse::<Value>::message("Cart cleared successfully"))
                .unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Cart cleared successfully"));
    }
}
