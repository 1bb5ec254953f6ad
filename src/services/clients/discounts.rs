use crate::errors::ServiceError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Client for the external discount validation service.
#[derive(Debug, Clone)]
pub struct DiscountClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct DiscountRequest<'a> {
    code: &'a str,
    subtotal: f64,
}

#[derive(Debug, Deserialize)]
struct DiscountResponse {
    #[serde(rename = "discountAmount")]
    discount_amount: f64,
}

impl DiscountClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: super::http_client(), base_url: base_url.into() }
    }

    /// Validate a discount code against the order value (subtotal + shipping
    /// + tax). A non-2xx response means the code is invalid or the service
    /// is down; either way the caller treats the discount as zero, and invalid
    /// codes never abort checkout.
    #[instrument(skip(self))]
    pub async fn validate(&self, code: &str, order_value: Decimal) -> Result<Decimal, ServiceError> {
        let request = DiscountRequest { code, subtotal: order_value.to_f64().unwrap_or_default() };

        let response = self
            .client
            .post(format!("{}/api/discounts/validate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("discount service: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "discount service returned {}",
                response.status()
            )));
        }

        let body: DiscountResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("discount service: {}", e)))?;

        Decimal::from_f64_retain(body.discount_amount)
            .map(|d| d.round_dp(2))
            .ok_or_else(|| {
                ServiceError::ExternalServiceError(
                    "discount service returned a non-finite amount".into(),
                )
            })
    }
}
