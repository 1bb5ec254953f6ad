use crate::{
    db::DbPool,
    entities::{PaymentGateway, PaymentGatewayModel},
    errors::ServiceError,
};
use dashmap::DashMap;
use sea_orm::EntityTrait;
use tracing::{info, instrument};

/// In-process cache of the `payment_gateways` settings table.
///
/// Loaded once at startup and refreshed through `reload` when the admin
/// settings change; the request path never queries the table. Gateway rows
/// are small, so the whole table is cached.
#[derive(Debug, Default)]
pub struct GatewaySettings {
    cache: DashMap<String, PaymentGatewayModel>,
}

impl GatewaySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the settings table into a fresh cache.
    pub async fn load(db: &DbPool) -> Result<Self, ServiceError> {
        let settings = Self::new();
        settings.reload(db).await?;
        Ok(settings)
    }

    /// Re-read the settings table, replacing the cached rows.
    #[instrument(skip_all)]
    pub async fn reload(&self, db: &DbPool) -> Result<usize, ServiceError> {
        let rows = PaymentGateway::find().all(db).await?;
        self.cache.clear();
        let count = rows.len();
        for row in rows {
            self.cache.insert(row.gateway_id.clone(), row);
        }
        info!(gateways = count, "payment gateway settings loaded");
        Ok(count)
    }

    pub fn get(&self, gateway_id: &str) -> Option<PaymentGatewayModel> {
        self.cache.get(gateway_id).map(|entry| entry.clone())
    }

    /// The gateway row, if configured and enabled.
    pub fn enabled(&self, gateway_id: &str) -> Result<PaymentGatewayModel, ServiceError> {
        match self.get(gateway_id) {
            Some(gateway) if gateway.enabled => Ok(gateway),
            _ => Err(ServiceError::ServiceUnavailable(format!(
                "{} payment is not available",
                gateway_id
            ))),
        }
    }

    /// Insert or replace a single cached row. Used by tests and by the
    /// admin settings handler after a write.
    pub fn put(&self, gateway: PaymentGatewayModel) {
        self.cache.insert(gateway.gateway_id.clone(), gateway);
    }
}

/// Gateway credentials resolved from a settings row.
///
/// Newer rows keep v3 API credentials in the JSON `config` column
/// (clientSecret / clientId / encryptionKey); older rows use the dedicated
/// key columns. JSON wins when both are present.
#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub secret_key: String,
    pub public_key: String,
    pub secret_hash: String,
}

pub fn credentials_of(gateway: &PaymentGatewayModel) -> GatewayCredentials {
    let from_config = |key: &str| -> Option<String> {
        gateway
            .config
            .as_ref()
            .and_then(|cfg| cfg.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    GatewayCredentials {
        secret_key: from_config("clientSecret")
            .or_else(|| gateway.secret_key.clone())
            .unwrap_or_default(),
        public_key: from_config("clientId")
            .or_else(|| gateway.public_key.clone())
            .unwrap_or_default(),
        secret_hash: from_config("encryptionKey")
            .or_else(|| gateway.secret_hash.clone())
            .unwrap_or_default(),
    }
}
