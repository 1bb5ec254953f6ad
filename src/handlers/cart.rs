use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    services::cart::GuestCartLine,
    services::pricing::Address,
    AppState,
};
use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart))
        .route("/", post(add_to_cart))
        .route("/", put(update_cart_item))
        .route("/", delete(remove_or_clear))
        .route("/transfer-guest", post(transfer_guest_cart))
}

/// Current cart with analytics
async fn get_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let cart_items = state
        .services
        .cart
        .snapshot(user.user_id)
        .await
        .map_err(map_service_error)?;
    let analytics = crate::services::cart::analytics_of(&cart_items);

    Ok(success_response(serde_json::json!({
        "success": true,
        "cartItems": cart_items,
        "analytics": analytics,
    })))
}

/// Add an item, merging any guest lines sent along
async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<AddToCartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    // Client-held guest lines may ride along on the first authenticated
    // add; merge them first, tolerating per-line failures.
    if let Some(guest_items) = &payload.guest_cart_items {
        if !guest_items.is_empty() {
            state
                .services
                .cart
                .transfer_guest_cart(user.user_id, guest_items, None)
                .await
                .map_err(map_service_error)?;
        }
    }

    let cart_item = state
        .services
        .cart
        .add_item(user.user_id, payload.book_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    let message = if payload.guest_cart_items.is_some() {
        "Cart merged and item added successfully"
    } else {
        "Item added to cart successfully"
    };

    Ok(success_response(serde_json::json!({
        "success": true,
        "cartItem": cart_item,
        "message": message,
    })))
}

/// Set a line's quantity; zero removes it
async fn update_cart_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateCartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart_item = state
        .services
        .cart
        .update_quantity(user.user_id, payload.book_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    let message = if payload.quantity > 0 {
        "Cart updated successfully"
    } else {
        "Item removed from cart"
    };

    Ok(success_response(serde_json::json!({
        "success": true,
        "cartItem": cart_item,
        "message": message,
    })))
}

/// Remove one line (`?book_id=`) or clear the whole cart
async fn remove_or_clear(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(params): Query<RemoveQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let message = match params.book_id {
        Some(book_id) => {
            state
                .services
                .cart
                .remove_item(user.user_id, book_id)
                .await
                .map_err(map_service_error)?;
            "Item removed from cart"
        }
        None => {
            state
                .services
                .cart
                .clear(user.user_id)
                .await
                .map_err(map_service_error)?;
            "Cart cleared successfully"
        }
    };

    Ok(success_response(serde_json::json!({
        "success": true,
        "message": message,
    })))
}

/// Merge a guest session's cart into the signed-in user's cart
async fn transfer_guest_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<TransferGuestCartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(address) = &payload.shipping_address {
        validate_input(address)?;
    }

    let summary = state
        .services
        .cart
        .transfer_guest_cart(
            user.user_id,
            &payload.guest_cart_items,
            payload.shipping_address.as_ref(),
        )
        .await
        .map_err(map_service_error)?;

    let message = if summary.failed == 0 {
        "Guest cart transferred successfully".to_string()
    } else {
        format!(
            "Guest cart transferred with {} of {} items failing",
            summary.failed, summary.total_items
        )
    };

    Ok(success_response(serde_json::json!({
        "success": true,
        "message": message,
        "details": summary,
    })))
}

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub book_id: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 99))]
    pub quantity: i32,
    pub guest_cart_items: Option<Vec<GuestCartLine>>,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartRequest {
    pub book_id: Uuid,
    #[validate(range(min = 0, max = 99))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveQuery {
    pub book_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TransferGuestCartRequest {
    pub guest_cart_items: Vec<GuestCartLine>,
    pub shipping_address: Option<Address>,
    #[allow(dead_code)]
    pub shipping_method: Option<serde_json::Value>,
}
