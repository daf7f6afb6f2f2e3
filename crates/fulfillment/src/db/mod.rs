//! Database operations for the fulfillment `PostgreSQL` schema (`store`).
//!
//! ## Tables
//!
//! - `product` - inventory counters (`stock`, `reserved`)
//! - `customer_order` / `order_item` - orders with price/address snapshots
//! - `webhook_event` - idempotency ledger for payment notifications
//! - `cart` / `cart_item` - active carts, cleared on payment confirmation
//!
//! All multi-step mutations run inside explicit transactions; the ledger
//! operations in [`inventory`] take `&mut PgConnection` so the caller
//! decides the transaction boundary.
//!
//! # Migrations
//!
//! Migrations live in `crates/fulfillment/migrations/` and run via:
//! ```bash
//! cargo run -p heron-cli -- migrate
//! ```

pub mod carts;
pub mod inventory;
pub mod orders;
pub mod webhook_events;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use orders::OrderRepository;
pub use webhook_events::EventGate;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate order number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Whether an error is a transient transaction conflict worth retrying.
///
/// Covers serialization failures (40001) and deadlocks (40P01). Row locks
/// taken in a consistent order make these rare, but concurrent checkouts
/// against overlapping carts can still lose a race.
#[must_use]
pub fn is_retryable_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(sqlx::error::DatabaseError::code)
        .is_some_and(|code| code == "40001" || code == "40P01")
}

/// Whether an error is a unique-constraint violation (23505).
#[must_use]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(sqlx::error::DatabaseError::code)
        .is_some_and(|code| code == "23505")
}
