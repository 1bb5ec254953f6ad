use crate::errors::ServiceError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

/// Client for the card payment processor's intent API.
///
/// The processor owns intent state end to end; confirmation happens
/// client-side with the returned secret and is verified by a webhook
/// endpoint outside this service. No local transaction row is written for
/// card intents.
#[derive(Debug, Clone)]
pub struct CardProcessorClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

/// A created payment intent, as returned by the processor.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    /// Amount in the currency's minor units
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct CreateIntentRequest<'a> {
    amount: i64,
    currency: &'a str,
    metadata: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt_email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl CardProcessorClient {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client: super::http_client(),
            api_base: api_base.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }

    /// Convert a decimal major-unit amount to the processor's minor units.
    pub fn to_minor_units(amount: Decimal) -> i64 {
        (amount * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }

    /// Create a payment intent and return its client secret.
    #[instrument(skip(self, metadata))]
    pub async fn create_payment_intent(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: &Value,
        customer_email: Option<&str>,
        description: Option<&str>,
    ) -> Result<PaymentIntent, ServiceError> {
        if !self.is_configured() {
            return Err(ServiceError::ServiceUnavailable(
                "card payment processor is not configured".into(),
            ));
        }

        let currency = currency.to_lowercase();
        let request = CreateIntentRequest {
            amount: Self::to_minor_units(amount),
            currency: &currency,
            metadata,
            receipt_email: customer_email,
            description,
        };

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("card processor: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(%status, detail, "card processor rejected intent");
            return Err(ServiceError::ExternalServiceError(format!(
                "card processor returned {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("card processor: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn converts_major_units_to_minor() {
        assert_eq!(CardProcessorClient::to_minor_units(dec!(10.00)), 1000);
        assert_eq!(CardProcessorClient::to_minor_units(dec!(0.01)), 1);
        assert_eq!(CardProcessorClient::to_minor_units(dec!(1234.56)), 123456);
    }

    #[test]
    fn unconfigured_client_is_flagged() {
        let client = CardProcessorClient::new("https://api.example.com", "");
        assert!(!client.is_configured());
        let client = CardProcessorClient::new("https://api.example.com", "sk_test_123");
        assert!(client.is_configured());
    }
}
