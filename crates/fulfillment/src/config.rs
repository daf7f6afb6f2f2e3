//! Fulfillment service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FULFILLMENT_DATABASE_URL` - `PostgreSQL` connection string (falls
//!   back to `DATABASE_URL`)
//! - `PAYMENT_PROVIDER_URL` - Base URL of the external payment provider
//! - `PAYMENT_PROVIDER_TOKEN` - API token for payment initiation
//!
//! ## Optional
//! - `FULFILLMENT_HOST` - Bind address (default: 127.0.0.1)
//! - `FULFILLMENT_PORT` - Listen port (default: 3100)
//! - `OPERATOR_TOKEN` - Bearer token for the on-demand sweep endpoint
//! - `SHIPPING_FLAT_FEE_MINOR` - Flat shipping fee in minor units (default: 599)
//! - `FREE_SHIPPING_THRESHOLD_MINOR` - Subtotal above which shipping is waived (default: 7500)
//! - `TAX_RATE_BASIS_POINTS` - Tax rate in basis points (default: 825 = 8.25%)
//! - `MINIMUM_ORDER_MINOR` - Minimum order subtotal in minor units (default: 500)
//! - `RESERVATION_TIMEOUT_MINUTES` - How long an unpaid order holds stock (default: 30)
//! - `SWEEP_INTERVAL_SECONDS` - How often the expiry sweeper runs (default: 300)
//! - `EXPIRE_TO_CANCELLED` - Whether expiry also cancels the order (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use heron_core::Money;
use secrecy::SecretString;
use thiserror::Error;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Fulfillment application configuration.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Payment provider configuration
    pub payment: PaymentConfig,
    /// Pricing policy applied at checkout
    pub pricing: PricingPolicy,
    /// Expiry sweeper configuration
    pub sweeper: SweeperConfig,
    /// Bearer token guarding the on-demand sweep endpoint
    pub operator_token: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Payment provider configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Base URL of the provider's API
    pub provider_url: String,
    /// API token for payment initiation
    pub provider_token: SecretString,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("provider_url", &self.provider_url)
            .field("provider_token", &"[REDACTED]")
            .finish()
    }
}

/// Server-side pricing policy. Client-computed totals are never trusted;
/// these knobs are the only inputs to order math besides catalog prices.
#[derive(Debug, Clone, Copy)]
pub struct PricingPolicy {
    /// Flat shipping fee in minor units
    pub shipping_flat_fee: Money,
    /// Subtotal at or above which shipping is waived
    pub free_shipping_threshold: Money,
    /// Tax rate in basis points (825 = 8.25%)
    pub tax_basis_points: i64,
    /// Minimum order subtotal
    pub minimum_order: Money,
}

/// Expiry sweeper configuration.
#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    /// How long an unpaid order may hold its reservation
    pub reservation_timeout: Duration,
    /// Interval between sweeps
    pub interval: Duration,
    /// Whether expired orders are also moved to `cancelled`
    pub expire_to_cancelled: bool,
}

impl FulfillmentConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid,
    /// or if secrets fail placeholder validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("FULFILLMENT_DATABASE_URL")?;
        let host = get_env_or_default("FULFILLMENT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("FULFILLMENT_HOST".to_string(), e.to_string())
            })?;
        let port = parse_env_or_default("FULFILLMENT_PORT", 3100)?;

        let payment = PaymentConfig::from_env()?;
        let pricing = PricingPolicy::from_env()?;
        let sweeper = SweeperConfig::from_env()?;

        let operator_token = match get_optional_env("OPERATOR_TOKEN") {
            Some(token) => {
                validate_secret_strength(&token, "OPERATOR_TOKEN")?;
                Some(SecretString::from(token))
            }
            None => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            payment,
            pricing,
            sweeper,
            operator_token,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let provider_token = get_required_env("PAYMENT_PROVIDER_TOKEN")?;
        validate_secret_strength(&provider_token, "PAYMENT_PROVIDER_TOKEN")?;

        Ok(Self {
            provider_url: get_required_env("PAYMENT_PROVIDER_URL")?,
            provider_token: SecretString::from(provider_token),
        })
    }
}

impl PricingPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            shipping_flat_fee: Money::from_minor(parse_env_or_default(
                "SHIPPING_FLAT_FEE_MINOR",
                599,
            )?),
            free_shipping_threshold: Money::from_minor(parse_env_or_default(
                "FREE_SHIPPING_THRESHOLD_MINOR",
                7500,
            )?),
            tax_basis_points: parse_env_or_default("TAX_RATE_BASIS_POINTS", 825)?,
            minimum_order: Money::from_minor(parse_env_or_default("MINIMUM_ORDER_MINOR", 500)?),
        })
    }
}

impl SweeperConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_minutes: u64 = parse_env_or_default("RESERVATION_TIMEOUT_MINUTES", 30)?;
        let interval_seconds: u64 = parse_env_or_default("SWEEP_INTERVAL_SECONDS", 300)?;

        Ok(Self {
            reservation_timeout: Duration::from_secs(timeout_minutes * 60),
            interval: Duration::from_secs(interval_seconds),
            expire_to_cancelled: parse_env_or_default("EXPIRE_TO_CANCELLED", false)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable into `T`, falling back to a default when
/// the variable is unset.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Validate that a secret is not an obvious placeholder.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}
