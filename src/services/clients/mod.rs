//! Outbound HTTP clients for the external collaborators the checkout
//! pipeline consumes: tax calculation, discount validation, the card
//! payment processor and the Flutterwave-compatible gateway.
//!
//! None of these retry; each call is attempted once and the caller applies
//! the documented fallback or surfaces the error.

pub mod card;
pub mod discounts;
pub mod flutterwave;
pub mod tax;

pub use card::{CardProcessorClient, PaymentIntent};
pub use discounts::DiscountClient;
pub use flutterwave::{FlutterwaveClient, FlutterwavePaymentData, InlinePaymentData};
pub use tax::TaxClient;

use std::time::Duration;

/// Default timeout for every outbound call.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}
