use crate::handlers::common::{map_service_error, success_response};
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    services::payments::{
        CreateIntentInput, InitializeFlutterwaveInput, IntentOutcome, PaymentMethod,
    },
    AppState,
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;

/// Creates the router for payment endpoints
pub fn payment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create-intent", post(create_intent))
        .route("/flutterwave/initialize", post(initialize_flutterwave))
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "amount": 4500,
    "currency": "ngn",
    "paymentMethod": "flutterwave",
    "description": "Payment for order ORD-1722945600000-8FK2Q1ZWP"
}))]
pub struct CreateIntentRequest {
    /// Amount in major currency units
    pub amount: Decimal,
    /// ISO 4217 code, defaults to NGN
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Free-form metadata forwarded to the processor
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Statement description
    #[serde(default)]
    pub description: Option<String>,
    /// One of card | flutterwave | bank_transfer
    #[serde(rename = "paymentMethod", default = "default_payment_method")]
    pub payment_method: String,
}

fn default_currency() -> String {
    "ngn".to_string()
}

fn default_payment_method() -> String {
    "card".to_string()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FlutterwaveInitializeRequest {
    pub amount: Decimal,
    #[serde(default = "default_upper_currency")]
    pub currency: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub tx_ref: String,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub customizations: Option<Customizations>,
    #[serde(default)]
    pub meta: Option<Value>,
}

fn default_upper_currency() -> String {
    "NGN".to_string()
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Customizations {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Create a payment session for the chosen method.
///
/// The card path returns a client secret for client-side confirmation; the
/// flutterwave path initializes an inline session and returns both the
/// hosted link and the modal payload.
#[utoipa::path(
    post,
    path = "/api/payment/create-intent",
    request_body = CreateIntentRequest,
    responses(
        (status = 200, description = "Payment session created"),
        (status = 400, description = "Invalid amount, currency or method", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthenticated", body = crate::errors::ErrorResponse),
        (status = 503, description = "Gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateIntentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_method =
        PaymentMethod::parse(&payload.payment_method).map_err(map_service_error)?;

    let outcome = state
        .services
        .payments
        .create_intent(
            &user,
            CreateIntentInput {
                amount: payload.amount,
                currency: payload.currency.clone(),
                metadata: payload.metadata,
                description: payload.description,
                payment_method,
            },
        )
        .await
        .map_err(map_service_error)?;

    let body = match outcome {
        IntentOutcome::Card(intent) => serde_json::json!({
            "success": true,
            "clientSecret": intent.client_secret,
            "paymentIntentId": intent.id,
            // The processor works in minor units; hand back major units.
            "amount": intent.amount as f64 / 100.0,
            "currency": intent.currency,
            "status": intent.status,
        }),
        IntentOutcome::Flutterwave(checkout) => serde_json::json!({
            "success": true,
            "paymentMethod": "flutterwave",
            "authorization_url": checkout.authorization_url,
            "inlinePaymentData": checkout.inline,
            "reference": checkout.reference,
            "amount": payload.amount.to_f64(),
            "currency": payload.currency.to_uppercase(),
        }),
    };

    Ok(success_response(body))
}

/// Initialize an inline Flutterwave payment session.
#[utoipa::path(
    post,
    path = "/api/payment/flutterwave/initialize",
    request_body = FlutterwaveInitializeRequest,
    responses(
        (status = 200, description = "Session initialized"),
        (status = 400, description = "Missing amount, email or reference", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthenticated", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transaction reference already used", body = crate::errors::ErrorResponse),
        (status = 503, description = "Gateway disabled or unreachable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initialize_flutterwave(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<FlutterwaveInitializeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (title, description) = payload
        .customizations
        .map(|c| (c.title, c.description))
        .unwrap_or((None, None));

    let checkout = state
        .services
        .payments
        .initialize_flutterwave(
            &user,
            InitializeFlutterwaveInput {
                amount: payload.amount,
                currency: payload.currency.to_uppercase(),
                email: payload.email,
                phone_number: payload.phone_number,
                tx_ref: payload.tx_ref,
                redirect_url: payload.redirect_url,
                title,
                description,
                meta: payload.meta,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "success": true,
        "data": checkout.response.data,
        "authorization_url": checkout.authorization_url,
        "reference": checkout.reference,
        "order_id": checkout.order_number,
    })))
}
