//! Payment confirmation: at-least-once webhooks, exactly-once effects.
//!
//! The provider may deliver the same notification repeatedly and out of
//! order. The idempotency gate (the `webhook_event` ledger) plus a
//! conditional status update make the financial transition apply exactly
//! once: a second delivery either finds the event processed or loses the
//! `pending -> confirmed` precondition.

use heron_core::{Email, Money, OrderId, OrderOwner, PaymentStatus, UserId};
use serde::Deserialize;
use sqlx::PgPool;

use crate::db::inventory::LedgerError;
use crate::db::{EventGate, RepositoryError, carts, inventory, orders, webhook_events};
use crate::models::Order;
use crate::services::notifications;

/// Event type the handler acts on; everything else is acknowledged and
/// ignored.
pub const PAYMENT_CONFIRMED: &str = "payment.confirmed";

/// An inbound payment-provider notification.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    /// Provider-assigned event id, the idempotency key.
    pub event_id: String,
    pub event_type: String,
    /// Correlation token: the order id handed to the provider at
    /// checkout.
    pub order_id: OrderId,
    /// Confirmed amount in minor currency units.
    pub amount: Money,
    /// Identity claim, matched against the order's owner.
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub guest_email: Option<String>,
}

impl PaymentNotification {
    /// The identity the notification claims paid, if it claims one
    /// coherently.
    fn claimed_owner(&self) -> Option<OrderOwner> {
        match (self.user_id, self.guest_email.as_deref()) {
            (Some(id), None) => Some(OrderOwner::User(UserId::new(id))),
            (None, Some(email)) => Email::parse(email).ok().map(OrderOwner::Guest),
            _ => None,
        }
    }
}

/// Result of handling a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The order was confirmed and its reservation committed.
    Confirmed,
    /// The event (or its effect) had already been applied; no-op.
    AlreadyProcessed,
    /// An event type this handler does not act on.
    Ignored,
}

/// Errors from webhook processing. Verification failures are hard
/// rejections that mutate nothing.
#[derive(Debug, thiserror::Error)]
pub enum ConfirmationError {
    #[error("order not found for notification")]
    OrderNotFound,

    /// The notification's identity claim does not match the order owner.
    #[error("notification identity does not match order owner")]
    OwnershipMismatch,

    /// The confirmed amount does not exactly match the order total.
    #[error("notification amount does not match order total")]
    AmountMismatch,

    /// The reservation was reclaimed by the expiry sweeper before the
    /// confirmation arrived. Needs operator attention: money may have
    /// moved for an order that no longer holds stock.
    #[error("reservation no longer held for order")]
    ReservationExpired,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Verify a notification against the order it targets.
///
/// Fails closed: any mismatch rejects the notification rather than
/// trusting it. Returns `Ok(false)` when the order is already paid -
/// an idempotent duplicate, not an error.
///
/// # Errors
///
/// `OwnershipMismatch` or `AmountMismatch`.
pub fn verify(
    order: &Order,
    notification: &PaymentNotification,
) -> Result<bool, ConfirmationError> {
    match notification.claimed_owner() {
        Some(claimed) if claimed == order.owner => {}
        _ => return Err(ConfirmationError::OwnershipMismatch),
    }

    if notification.amount != order.total {
        return Err(ConfirmationError::AmountMismatch);
    }

    Ok(order.payment_status != PaymentStatus::Paid)
}

/// Handle a payment-provider notification.
///
/// Steps: record the event (crash-detectable before any side effect),
/// resolve and verify the order, then in one transaction confirm the
/// order, commit every line item's reservation, clear the owner's cart,
/// and mark the event processed. Best-effort confirmation messaging runs
/// after the transaction commits and cannot fail the handler.
///
/// # Errors
///
/// See [`ConfirmationError`]. A failed transaction leaves the event
/// unprocessed so a provider retry can safely start over.
pub async fn handle(
    pool: &PgPool,
    notification: &PaymentNotification,
) -> Result<ConfirmationOutcome, ConfirmationError> {
    match webhook_events::record(pool, &notification.event_id, &notification.event_type).await? {
        EventGate::AlreadyProcessed => {
            tracing::info!(
                event_id = %notification.event_id,
                "duplicate webhook delivery, skipping"
            );
            return Ok(ConfirmationOutcome::AlreadyProcessed);
        }
        EventGate::Retry => {
            tracing::info!(
                event_id = %notification.event_id,
                "retrying previously incomplete webhook"
            );
        }
        EventGate::New => {}
    }

    if notification.event_type != PAYMENT_CONFIRMED {
        // Acknowledge unknown event types so the provider stops resending.
        let mut tx = pool.begin().await.map_err(RepositoryError::Database)?;
        webhook_events::mark_processed(&mut tx, &notification.event_id).await?;
        tx.commit().await.map_err(RepositoryError::Database)?;
        tracing::debug!(
            event_type = %notification.event_type,
            "ignoring unhandled webhook event type"
        );
        return Ok(ConfirmationOutcome::Ignored);
    }

    let mut tx = pool.begin().await.map_err(RepositoryError::Database)?;

    let order = orders::lock(&mut tx, notification.order_id)
        .await?
        .ok_or(ConfirmationError::OrderNotFound)?;

    let needs_confirmation = verify(&order, notification).inspect_err(|err| {
        // Security-relevant: a tampered or misrouted notification.
        tracing::warn!(
            event_id = %notification.event_id,
            order_id = %order.id,
            error = %err,
            "webhook verification failed"
        );
    })?;

    if !needs_confirmation {
        // Paid already, under a different event id. Ack this one too.
        webhook_events::mark_processed(&mut tx, &notification.event_id).await?;
        tx.commit().await.map_err(RepositoryError::Database)?;
        return Ok(ConfirmationOutcome::AlreadyProcessed);
    }

    if !order.reservation_held() {
        tracing::error!(
            order_id = %order.id,
            order_number = %order.order_number,
            "payment confirmed for an order whose reservation already expired"
        );
        return Err(ConfirmationError::ReservationExpired);
    }

    if !orders::confirm_payment(&mut tx, order.id).await? {
        // The conditional update lost a race we could not observe under
        // the row lock; treat as a duplicate.
        webhook_events::mark_processed(&mut tx, &notification.event_id).await?;
        tx.commit().await.map_err(RepositoryError::Database)?;
        return Ok(ConfirmationOutcome::AlreadyProcessed);
    }

    // Convert every reservation into a permanent stock decrement.
    let items = orders::items(&mut *tx, order.id).await?;
    for item in &items {
        inventory::commit(&mut tx, item.product_id, item.quantity).await?;
    }

    carts::clear_for_owner(&mut tx, &order.owner).await?;
    webhook_events::mark_processed(&mut tx, &notification.event_id).await?;

    tx.commit().await.map_err(RepositoryError::Database)?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %order.total,
        "payment confirmed, reservation committed"
    );

    // Post-commit, best-effort: failure is logged, never propagated, so
    // the provider sees success for a transition that did succeed.
    notifications::send_order_confirmation(&order, &items).await;

    Ok(ConfirmationOutcome::Confirmed)
}
