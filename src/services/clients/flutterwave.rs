use crate::errors::ServiceError;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::instrument;

const LIVE_BASE_URL: &str = "https://api.flutterwave.com";
const SANDBOX_BASE_URL: &str = "https://sandbox-api.flutterwave.com";

/// Client for the Flutterwave-compatible inline payment gateway.
///
/// Credentials come from the `payment_gateways` settings cache, not the
/// environment, so a disabled or re-keyed gateway takes effect on the next
/// cache reload without a restart.
#[derive(Debug, Clone)]
pub struct FlutterwaveClient {
    client: reqwest::Client,
    secret_key: String,
    public_key: String,
    secret_hash: String,
    base_url: String,
}

/// Payment initialization payload.
#[derive(Debug, Clone, Serialize)]
pub struct FlutterwavePaymentData {
    pub tx_ref: String,
    pub amount: f64,
    pub currency: String,
    pub redirect_url: String,
    pub customer: FlutterwaveCustomer,
    pub customizations: FlutterwaveCustomizations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// SHA-256 verification hash over the payment identity fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlutterwaveCustomer {
    pub email: String,
    pub phone_number: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlutterwaveCustomizations {
    pub title: String,
    pub description: String,
    pub logo: String,
}

/// Successful initialization response: `data.link` is the hosted checkout
/// URL the storefront may redirect to instead of using the inline modal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlutterwaveInitResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    pub data: FlutterwaveInitData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlutterwaveInitData {
    pub link: String,
}

/// Everything the storefront's inline modal needs, minus secrets.
#[derive(Debug, Clone, Serialize)]
pub struct InlinePaymentData {
    pub public_key: String,
    pub tx_ref: String,
    pub amount: f64,
    pub currency: String,
    pub payment_options: String,
    pub customer: FlutterwaveCustomer,
    pub customizations: FlutterwaveCustomizations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl FlutterwaveClient {
    pub fn new(
        secret_key: impl Into<String>,
        public_key: impl Into<String>,
        secret_hash: impl Into<String>,
        test_mode: bool,
    ) -> Self {
        let base_url = if test_mode { SANDBOX_BASE_URL } else { LIVE_BASE_URL };
        Self {
            client: super::http_client(),
            secret_key: secret_key.into(),
            public_key: public_key.into(),
            secret_hash: secret_hash.into(),
            base_url: base_url.to_string(),
        }
    }

    /// Point the client at a different host. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Initialize a hosted payment session.
    #[instrument(skip(self, data), fields(tx_ref = %data.tx_ref))]
    pub async fn initialize_payment(
        &self,
        data: &FlutterwavePaymentData,
    ) -> Result<FlutterwaveInitResponse, ServiceError> {
        let response = self
            .client
            .post(format!("{}/v3/payments", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(data)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("flutterwave: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(%status, detail, "flutterwave initialization rejected");
            return Err(ServiceError::ExternalServiceError(format!(
                "flutterwave returned {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("flutterwave: {}", e)))
    }

    /// Build the payload for the storefront's inline checkout modal.
    pub fn prepare_inline_payment_data(&self, data: &FlutterwavePaymentData) -> InlinePaymentData {
        InlinePaymentData {
            public_key: self.public_key.clone(),
            tx_ref: data.tx_ref.clone(),
            amount: data.amount,
            currency: data.currency.clone(),
            payment_options: "card,mobilemoney,ussd".to_string(),
            customer: data.customer.clone(),
            customizations: data.customizations.clone(),
            meta: data.meta.clone(),
        }
    }

    /// SHA-256 verification hash over the payment identity fields.
    pub fn payment_hash(&self, tx_ref: &str, amount: Decimal, currency: &str, email: &str) -> String {
        let amount = amount.to_f64().unwrap_or_default();
        let input = format!(
            "{}{}{}{}{}{}",
            self.public_key, tx_ref, amount, currency, email, self.secret_key
        );
        hex::encode(Sha256::digest(input.as_bytes()))
    }

    /// Validate an incoming webhook signature against the gateway hash.
    pub fn validate_webhook_signature(&self, payload: &str, signature: &str) -> bool {
        type HmacSha256 = Hmac<Sha256>;
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret_hash.as_bytes()) else {
            return false;
        };
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes()) == signature
    }
}
