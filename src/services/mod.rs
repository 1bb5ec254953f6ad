// Checkout pipeline services
pub mod cart;
pub mod orders;
pub mod payments;
pub mod pricing;

// Gateway configuration cache
pub mod gateway_settings;

// Outbound HTTP clients
pub mod clients;

pub use cart::CartService;
pub use gateway_settings::GatewaySettings;
pub use orders::OrderService;
pub use payments::PaymentService;
pub use pricing::PricingService;
