use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        clients::{CardProcessorClient, DiscountClient, TaxClient},
        CartService, GatewaySettings, OrderService, PaymentService, PricingService,
    },
    AppState,
};
use axum::Router;
use std::sync::Arc;

pub mod cart;
pub mod common;
pub mod orders;
pub mod payments;

/// Aggregated services used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub pricing: Arc<PricingService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub gateway_settings: Arc<GatewaySettings>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        gateway_settings: Arc<GatewaySettings>,
        config: &AppConfig,
    ) -> Self {
        let tax_client = TaxClient::new(config.tax.service_url.clone());
        let discount_client = DiscountClient::new(config.discount_service_url.clone());
        let card_client =
            CardProcessorClient::new(config.card.api_base.clone(), config.card.secret_key.clone());

        let cart = Arc::new(CartService::new(db.clone(), event_sender.clone()));
        let pricing = Arc::new(PricingService::new(
            db.clone(),
            tax_client,
            discount_client,
            config.tax.fallback_rate_decimal(),
        ));
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
        let payments = Arc::new(PaymentService::new(
            db,
            event_sender,
            gateway_settings.clone(),
            card_client,
            config.app_url.clone(),
        ));

        Self { cart, pricing, orders, payments, gateway_settings }
    }
}

/// Assemble the `/api` router.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api/cart", cart::cart_routes())
        .nest("/api/orders", orders::order_routes())
        .nest("/api/payment", payments::payment_routes())
}
