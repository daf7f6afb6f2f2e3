//! Run one expiry sweep pass from the command line.
//!
//! Useful for draining a backlog after downtime, or for operating the
//! sweeper from cron instead of the in-process scheduler.

use std::time::Duration;

use tracing::info;

use heron_fulfillment::config::SweeperConfig;
use heron_fulfillment::db;
use heron_fulfillment::services::sweeper;

/// Run a single sweep and print the report.
///
/// # Errors
///
/// Returns an error if the database URL is missing or the sweep fails
/// before examining any orders.
pub async fn run(timeout_minutes: u64, cancel: bool) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;

    let config = SweeperConfig {
        reservation_timeout: Duration::from_secs(timeout_minutes * 60),
        // One-shot run, the interval is unused.
        interval: Duration::from_secs(0),
        expire_to_cancelled: cancel,
    };

    let report = sweeper::run_sweep(&pool, &config).await?;

    info!("Sweep complete!");
    info!("  Orders examined: {}", report.examined);
    info!("  Reservations released: {}", report.released);
    info!("  Orders cancelled: {}", report.cancelled);
    info!("  Failures: {}", report.failed);

    Ok(())
}
