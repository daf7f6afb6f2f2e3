//! Expiry sweeper: reclaim reservations abandoned past the timeout.
//!
//! Checkout holds stock the moment an order is placed; if payment never
//! arrives those units would be locked away forever. The sweeper
//! periodically finds pending orders older than the reservation timeout
//! and returns their holds to the pool, one transaction per order, and
//! keeps going when an individual order fails.
//!
//! Sweeps are idempotent and safe to overlap: eligibility requires
//! `reservation_released_at IS NULL`, and each release double-checks that
//! the product still holds enough reserved units.

use chrono::Utc;
use sqlx::PgPool;

use heron_core::OrderId;

use crate::config::SweeperConfig;
use crate::db::{OrderRepository, RepositoryError, inventory, orders};
use crate::services::orders::EXPIRY_CANCEL_REASON;
use crate::state::AppState;

/// How many expired orders one sweep will touch.
const SWEEP_BATCH_SIZE: i64 = 100;

/// Summary of one sweep run, for operator visibility.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    /// Orders whose reservation was past the timeout.
    pub examined: usize,
    /// Orders whose hold was returned to the pool.
    pub released: usize,
    /// Orders additionally moved to `cancelled` by policy.
    pub cancelled: usize,
    /// Orders that failed and will be retried next sweep.
    pub failed: usize,
}

/// Run one sweep over expired pending orders.
///
/// Failures on individual orders are logged and counted, never fatal to
/// the rest of the sweep.
///
/// # Errors
///
/// Returns `RepositoryError` only if the eligibility query itself fails.
pub async fn run_sweep(
    pool: &PgPool,
    config: &SweeperConfig,
) -> Result<SweepReport, RepositoryError> {
    let timeout = chrono::Duration::from_std(config.reservation_timeout)
        .unwrap_or_else(|_| chrono::Duration::minutes(30));
    let cutoff = Utc::now() - timeout;

    let expired = OrderRepository::new(pool)
        .find_expired_pending(cutoff, SWEEP_BATCH_SIZE)
        .await?;

    let mut report = SweepReport {
        examined: expired.len(),
        ..SweepReport::default()
    };

    for order_id in expired {
        match sweep_order(pool, config, order_id).await {
            Ok(cancelled) => {
                report.released += 1;
                if cancelled {
                    report.cancelled += 1;
                }
            }
            Err(err) => {
                report.failed += 1;
                tracing::error!(order_id = %order_id, error = %err, "failed to sweep order");
            }
        }
    }

    if report.examined > 0 {
        tracing::info!(
            examined = report.examined,
            released = report.released,
            cancelled = report.cancelled,
            failed = report.failed,
            "expiry sweep finished"
        );
    }

    Ok(report)
}

/// Release one expired order's reservation inside its own transaction.
///
/// Returns whether the order was also cancelled by policy.
async fn sweep_order(
    pool: &PgPool,
    config: &SweeperConfig,
    order_id: OrderId,
) -> Result<bool, RepositoryError> {
    let mut tx = pool.begin().await?;

    // Re-check under the row lock: a payment confirmation racing this
    // sweep either got there first (order no longer pending) or is
    // blocked until we commit and will then find the hold released.
    let Some(order) = orders::lock(&mut tx, order_id).await? else {
        return Ok(false);
    };
    if !order.reservation_held()
        || order.status != heron_core::OrderStatus::Pending
        || order.payment_status != heron_core::PaymentStatus::Pending
    {
        return Ok(false);
    }

    let items = orders::items(&mut *tx, order_id).await?;
    for item in &items {
        // Never release more than is actually held.
        inventory::release_if_held(&mut tx, item.product_id, item.quantity)
            .await
            .map_err(|e| match e {
                inventory::LedgerError::Database(db) => RepositoryError::Database(db),
                other => RepositoryError::DataCorruption(other.to_string()),
            })?;
    }

    let cancelled = if config.expire_to_cancelled {
        // A system action, deliberately logged apart from user-initiated
        // cancellations.
        orders::record_cancellation(&mut tx, order_id, EXPIRY_CANCEL_REASON, true).await?
    } else {
        orders::mark_reservation_released(&mut tx, order_id).await?;
        false
    };

    tx.commit().await?;

    tracing::info!(
        order_id = %order_id,
        order_number = %order.order_number,
        cancelled_by_policy = cancelled,
        actor = "sweeper",
        "expired reservation released"
    );

    Ok(cancelled)
}

/// Spawn the periodic sweeper task.
///
/// Runs until the process shuts down; an individual failed sweep is
/// logged and the loop continues.
pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let sweeper_config = state.config().sweeper;
        let mut interval = tokio::time::interval(sweeper_config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(err) = run_sweep(state.pool(), &sweeper_config).await {
                tracing::error!(error = %err, "expiry sweep aborted");
            }
        }
    })
}
