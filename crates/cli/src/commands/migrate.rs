//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! heron-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `FULFILLMENT_DATABASE_URL` - `PostgreSQL` connection string
//!   (falls back to `DATABASE_URL`)
//!
//! Migration files live in `crates/fulfillment/migrations/`.

use tracing::info;

use heron_fulfillment::db;

/// Run fulfillment database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection
/// fails, or a migration fails to apply.
pub async fn fulfillment() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    info!("Connecting to fulfillment database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running fulfillment migrations...");
    sqlx::migrate!("../fulfillment/migrations").run(&pool).await?;

    info!("Fulfillment migrations complete!");
    Ok(())
}
