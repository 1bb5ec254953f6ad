use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    services::cart::analytics_of,
    services::payments::PaymentMethod,
    services::pricing::{Address, ProvidedTotals},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order))
        .route("/", get(list_orders))
        .route("/summary", get(checkout_summary))
        .route("/:order_id", get(get_order))
}

/// Assemble and persist an order from the caller's cart.
///
/// The cart store, not the request body, is the source of truth for the
/// order lines; the body's `items` only signal intent and the optional
/// totals support the idempotent re-entry path.
async fn create_order(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.items.is_empty() {
        return Err(ApiError::BadRequest {
            message: "Order items are required".to_string(),
            details: None,
        });
    }
    if let Some(address) = &payload.shipping_address {
        validate_input(address)?;
    }

    let payment_method = payload
        .payment_method
        .as_deref()
        .map(PaymentMethod::parse)
        .transpose()
        .map_err(map_service_error)?;

    let lines = state
        .services
        .cart
        .checkout_snapshot(user.user_id)
        .await
        .map_err(map_service_error)?;

    let provided = ProvidedTotals {
        subtotal: payload.subtotal,
        shipping: payload.shipping_cost,
        tax: payload.tax_amount,
        discount: payload.discount_amount,
        total: payload.total,
    };

    let shipping_method_id = payload
        .shipping_method
        .as_deref()
        .and_then(|s| s.parse::<i32>().ok());

    let quote = state
        .services
        .pricing
        .quote(
            &lines,
            payload.shipping_address.as_ref(),
            shipping_method_id,
            payload.discount_code.as_deref(),
            &provided,
        )
        .await
        .map_err(map_service_error)?;

    let order = state
        .services
        .orders
        .create_order(
            user.user_id,
            &lines,
            &quote,
            &state.config.currency,
            payload.shipping_address.as_ref(),
            payload.billing_address.as_ref(),
            payment_method.map(|m| m.as_str()),
            payload.payment_intent_id.as_deref(),
        )
        .await
        .map_err(map_service_error)?;

    // Bank transfers wait on the manual verification workflow; every other
    // method settles through its gateway callback.
    if payment_method == Some(PaymentMethod::BankTransfer) {
        state
            .services
            .payments
            .mark_bank_transfer_pending(user.user_id, order.id)
            .await
            .map_err(map_service_error)?;
    }

    // Cart intentionally NOT cleared here: it survives until payment
    // confirmation so a failed payment can be retried.

    Ok(success_response(serde_json::json!({
        "success": true,
        "orderId": order.id,
        "orderNumber": order.order_number,
        "total": quote.total,
        "subtotal": quote.subtotal.amount,
        "shipping": quote.shipping.amount,
        "tax": quote.tax.amount,
        "discount": quote.discount.amount,
    })))
}

/// The caller's orders, newest first
async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_user_orders(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "success": true,
        "orders": orders,
    })))
}

/// One order with its items
async fn get_order(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(order_id)
        .await
        .map_err(map_service_error)?;

    if order.user_id != user.user_id {
        return Err(ApiError::NotFound(format!("Order {} not found", order_id)));
    }

    let items = state
        .services
        .orders
        .get_order_items(order_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "success": true,
        "order": order,
        "items": items,
    })))
}

/// Priced checkout summary for the current cart
async fn checkout_summary(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(params): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lines = state
        .services
        .cart
        .checkout_snapshot(user.user_id)
        .await
        .map_err(map_service_error)?;

    let quote = state
        .services
        .pricing
        .quote(
            &lines,
            None,
            params.shipping_method_id,
            params.discount_code.as_deref(),
            &ProvidedTotals::default(),
        )
        .await
        .map_err(map_service_error)?;

    let shipping_methods = state
        .services
        .pricing
        .active_methods()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "success": true,
        "summary": quote,
        "analytics": analytics_of(&lines),
        "shippingMethods": shipping_methods,
        "cartItems": lines,
    })))
}

// Request DTOs

#[derive(Debug, Deserialize)]
pub struct OrderItemInput {
    #[allow(dead_code)]
    pub book_id: Uuid,
    #[allow(dead_code)]
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemInput>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub shipping_method: Option<String>,
    pub payment_method: Option<String>,
    pub discount_code: Option<String>,
    pub payment_intent_id: Option<String>,
    pub subtotal: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub total: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub shipping_method_id: Option<i32>,
    pub discount_code: Option<String>,
}
