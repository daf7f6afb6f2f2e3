//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod sweep;

use secrecy::SecretString;

/// Load the fulfillment database URL from the environment.
///
/// Checks `FULFILLMENT_DATABASE_URL` first, then falls back to
/// `DATABASE_URL`.
pub fn database_url() -> Result<SecretString, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    std::env::var("FULFILLMENT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "FULFILLMENT_DATABASE_URL not set".into())
}
