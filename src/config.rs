use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "NGN";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Tax calculation configuration.
///
/// The tax service is an external HTTP dependency; `fallback_rate` is the
/// documented flat rate applied to (subtotal + shipping) when the service is
/// unreachable. It is an explicit default, not a silent zero.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct TaxConfig {
    #[serde(default = "default_tax_service_url")]
    pub service_url: String,

    /// Flat fallback rate as a fraction, e.g. 0.07 for 7%.
    #[serde(default = "default_tax_fallback_rate")]
    pub fallback_rate: f64,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            service_url: default_tax_service_url(),
            fallback_rate: default_tax_fallback_rate(),
        }
    }
}

impl TaxConfig {
    pub fn fallback_rate_decimal(&self) -> Decimal {
        Decimal::from_f64_retain(self.fallback_rate).unwrap_or(Decimal::ZERO)
    }
}

/// Card payment processor (intent API) configuration.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CardProcessorConfig {
    #[serde(default = "default_card_api_base")]
    pub api_base: String,

    /// Secret API key; empty disables the card path.
    #[serde(default)]
    pub secret_key: String,
}

impl Default for CardProcessorConfig {
    fn default() -> Self {
        Self { api_base: default_card_api_base(), secret_key: String::new() }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret used to verify the external auth provider's bearer tokens
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Public base URL of the storefront, used for payment redirects
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Currency every order is priced in
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Tax service settings
    #[serde(default)]
    pub tax: TaxConfig,

    /// Discount validation service base URL
    #[serde(default = "default_discount_service_url")]
    pub discount_service_url: String,

    /// Card payment processor settings
    #[serde(default)]
    pub card: CardProcessorConfig,

    /// Maximum database connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum database connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_app_url() -> String {
    "https://readnwin.com".to_string()
}
fn default_tax_service_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_discount_service_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_card_api_base() -> String {
    "https://api.stripe.com".to_string()
}
fn default_tax_fallback_rate() -> f64 {
    0.07
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}

impl AppConfig {
    /// Minimal constructor used by tests and tools.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            app_url: default_app_url(),
            currency: default_currency(),
            tax: TaxConfig::default(),
            discount_service_url: default_discount_service_url(),
            card: CardProcessorConfig::default(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            cors_allowed_origins: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Load configuration from `config/` files plus `READNWIN__`-prefixed
/// environment variables, selected by RUN_ENV/APP_ENV.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let mut builder = Config::builder()
        .set_default("database_url", "postgres://localhost/readnwin")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    // Development fallback only; production must supply its own secret.
    if run_env != "production" {
        builder = builder.set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?;
    }

    let config = builder
        .add_source(Environment::with_prefix("READNWIN").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}

/// Initialise the tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("readnwin_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tax_fallback_rate_defaults_to_seven_percent() {
        let cfg = TaxConfig::default();
        assert_eq!(cfg.fallback_rate_decimal(), dec!(0.07));
    }

    #[test]
    fn bind_address_combines_host_and_port() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "x".repeat(64),
            "127.0.0.1".into(),
            9000,
            "test".into(),
        );
        assert_eq!(cfg.bind_address(), "127.0.0.1:9000");
        assert!(!cfg.is_production());
        assert_eq!(cfg.currency, "NGN");
    }

    #[test]
    fn short_jwt_secret_fails_validation() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "short".into(),
            "127.0.0.1".into(),
            9000,
            "test".into(),
        );
        assert!(cfg.validate().is_err());
    }
}
