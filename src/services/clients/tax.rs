use crate::errors::ServiceError;
use crate::services::pricing::Address;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Client for the external tax calculation service.
#[derive(Debug, Clone)]
pub struct TaxClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct TaxRequest<'a> {
    subtotal: f64,
    shipping: f64,
    address: TaxAddress<'a>,
}

#[derive(Debug, Serialize)]
struct TaxAddress<'a> {
    state: &'a str,
    country: &'a str,
    #[serde(rename = "zipCode")]
    zip_code: &'a str,
    city: &'a str,
}

#[derive(Debug, Deserialize)]
struct TaxResponse {
    #[serde(rename = "taxAmount")]
    tax_amount: f64,
}

impl TaxClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: super::http_client(), base_url: base_url.into() }
    }

    /// Calculate tax on (subtotal + shipping) for the given address.
    ///
    /// Errors bubble up so the caller can apply the documented flat-rate
    /// fallback; this client never substitutes a value itself.
    #[instrument(skip(self, address))]
    pub async fn calculate(
        &self,
        taxable_amount: Decimal,
        shipping: Decimal,
        address: &Address,
    ) -> Result<Decimal, ServiceError> {
        let request = TaxRequest {
            subtotal: taxable_amount.to_f64().unwrap_or_default(),
            shipping: shipping.to_f64().unwrap_or_default(),
            address: TaxAddress {
                state: &address.state,
                country: &address.country,
                zip_code: &address.zip_code,
                city: &address.city,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/tax/calculate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("tax service: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "tax service returned {}",
                response.status()
            )));
        }

        let body: TaxResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("tax service: {}", e)))?;

        Decimal::from_f64_retain(body.tax_amount)
            .map(|d| d.round_dp(2))
            .ok_or_else(|| {
                ServiceError::ExternalServiceError("tax service returned a non-finite amount".into())
            })
    }
}
