//! Webhook idempotency ledger.
//!
//! Payment-provider notifications arrive at least once and possibly out
//! of order. Every event is recorded before any side effect runs; the
//! `processed` flag is flipped inside the same transaction as the order
//! mutation, so an aborted transaction leaves the event retryable and a
//! committed one makes the retry a no-op.

use sqlx::{PgConnection, PgPool};

use super::RepositoryError;

/// The outcome of recording an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventGate {
    /// First sighting of this event id.
    New,
    /// Seen before but never fully processed (a crashed or failed earlier
    /// attempt); safe to process again.
    Retry,
    /// Already applied; the caller must not re-apply any effect.
    AlreadyProcessed,
}

/// Record an event id before processing begins.
///
/// Append-only: an existing row is never modified here, only inspected.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record(
    pool: &PgPool,
    event_id: &str,
    event_type: &str,
) -> Result<EventGate, RepositoryError> {
    let inserted = sqlx::query(
        r"
        INSERT INTO store.webhook_event (event_id, event_type)
        VALUES ($1, $2)
        ON CONFLICT (event_id) DO NOTHING
        ",
    )
    .bind(event_id)
    .bind(event_type)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted == 1 {
        return Ok(EventGate::New);
    }

    let processed: bool =
        sqlx::query_scalar("SELECT processed FROM store.webhook_event WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(pool)
            .await?;

    Ok(if processed {
        EventGate::AlreadyProcessed
    } else {
        EventGate::Retry
    })
}

/// Flip an event to processed within the caller's transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_processed(
    conn: &mut PgConnection,
    event_id: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE store.webhook_event
        SET processed = TRUE, processed_at = now()
        WHERE event_id = $1
        ",
    )
    .bind(event_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
