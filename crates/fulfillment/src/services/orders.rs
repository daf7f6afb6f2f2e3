//! Administrative order transitions.
//!
//! Guard validation is pure (see [`plan_transition`]) so the transition
//! table can be tested without a database; applying a planned transition
//! runs in one transaction that covers both the status update and its
//! ledger effect.

use heron_core::{OrderId, OrderOwner, OrderStatus, PaymentStatus};
use sqlx::PgPool;

use crate::db::inventory::LedgerError;
use crate::db::{RepositoryError, inventory, orders};
use crate::models::{Order, OrderItem};

/// Standard reason recorded when the expiry policy cancels an order.
pub const EXPIRY_CANCEL_REASON: &str = "payment window expired";

/// A requested transition with its guard inputs.
#[derive(Debug, Clone, Default)]
pub struct TransitionRequest {
    pub target: OrderStatus,
    pub tracking_number: Option<String>,
    pub cancel_reason: Option<String>,
}

/// What a transition does to the inventory ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    /// No counters move.
    None,
    /// Return the reservation hold to the available pool (pre-payment
    /// cancellation).
    ReleaseReservation,
    /// Return committed units to sellable stock (post-payment
    /// cancellation or return) - materially different from a release.
    Restock,
}

/// A transition that passed every guard.
#[derive(Debug, Clone)]
pub struct PlannedTransition {
    pub target: OrderStatus,
    pub ledger_effect: LedgerEffect,
    pub tracking_number: Option<String>,
    pub cancel_reason: Option<String>,
}

/// Errors from administrative transitions.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("order not found")]
    NotFound,

    /// A guard was violated; the order is left unchanged.
    #[error("cannot move order from {from} to {to}: {reason}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        reason: String,
    },

    /// The requester does not own the order.
    #[error("requester does not own this order")]
    OwnershipMismatch,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn invalid(from: OrderStatus, to: OrderStatus, reason: &str) -> TransitionError {
    TransitionError::InvalidTransition {
        from,
        to,
        reason: reason.to_owned(),
    }
}

/// Validate a requested transition against the current order state and
/// decide its ledger effect. Pure; mutates nothing.
///
/// # Errors
///
/// `InvalidTransition` naming the violated guard.
pub fn plan_transition(
    order: &Order,
    request: &TransitionRequest,
) -> Result<PlannedTransition, TransitionError> {
    let from = order.status;
    let to = request.target;

    if !from.can_transition_to(to) {
        let reason = if from.is_terminal() {
            "order is in a terminal state"
        } else {
            "transition not permitted"
        };
        return Err(invalid(from, to, reason));
    }

    match to {
        OrderStatus::Confirmed => {
            // Payment confirmation is driven by the webhook handler,
            // never by a client-initiated status update.
            Err(invalid(from, to, "confirmation requires a payment event"))
        }
        OrderStatus::Processing => Ok(PlannedTransition {
            target: to,
            ledger_effect: LedgerEffect::None,
            tracking_number: None,
            cancel_reason: None,
        }),
        OrderStatus::Shipped => {
            let tracking = request
                .tracking_number
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| invalid(from, to, "tracking number is required"))?;
            Ok(PlannedTransition {
                target: to,
                ledger_effect: LedgerEffect::None,
                tracking_number: Some(tracking.to_owned()),
                cancel_reason: None,
            })
        }
        OrderStatus::Delivered => {
            // A delivered order is paid, and confirmation committed its
            // entire hold; whatever `reserved` now shows on the product
            // belongs to other pending orders and must not be touched.
            Ok(PlannedTransition {
                target: to,
                ledger_effect: LedgerEffect::None,
                tracking_number: None,
                cancel_reason: None,
            })
        }
        OrderStatus::Cancelled => {
            let reason = request
                .cancel_reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| invalid(from, to, "cancel reason is required"))?;

            // Paid orders had their reservation committed into a stock
            // decrement; cancelling them puts units back into stock.
            // Unpaid orders still hold a reservation - unless the sweeper
            // already reclaimed it.
            let ledger_effect = if order.payment_status == PaymentStatus::Paid {
                LedgerEffect::Restock
            } else if order.reservation_held() {
                LedgerEffect::ReleaseReservation
            } else {
                LedgerEffect::None
            };

            Ok(PlannedTransition {
                target: to,
                ledger_effect,
                tracking_number: None,
                cancel_reason: Some(reason.to_owned()),
            })
        }
        OrderStatus::Refunded => Ok(PlannedTransition {
            target: to,
            ledger_effect: LedgerEffect::Restock,
            tracking_number: None,
            cancel_reason: None,
        }),
        OrderStatus::Pending => Err(invalid(from, to, "orders only start pending")),
    }
}

/// Apply a status transition with its ledger effect in one transaction.
///
/// # Errors
///
/// See [`TransitionError`]; a violated guard leaves the order unchanged.
pub async fn update_status(
    pool: &PgPool,
    order_id: OrderId,
    request: &TransitionRequest,
) -> Result<Order, TransitionError> {
    let mut tx = pool.begin().await.map_err(RepositoryError::Database)?;

    let order = orders::lock(&mut tx, order_id)
        .await?
        .ok_or(TransitionError::NotFound)?;
    let planned = plan_transition(&order, request)?;

    let applied = match planned.target {
        OrderStatus::Processing => orders::record_processing(&mut tx, order_id).await?,
        OrderStatus::Shipped => {
            let tracking = planned.tracking_number.as_deref().unwrap_or_default();
            orders::record_shipment(&mut tx, order_id, tracking).await?
        }
        OrderStatus::Delivered => orders::record_delivery(&mut tx, order_id).await?,
        OrderStatus::Cancelled => {
            let reason = planned.cancel_reason.as_deref().unwrap_or_default();
            let releases = planned.ledger_effect == LedgerEffect::ReleaseReservation;
            orders::record_cancellation(&mut tx, order_id, reason, releases).await?
        }
        OrderStatus::Refunded => orders::record_refund(&mut tx, order_id).await?,
        OrderStatus::Pending | OrderStatus::Confirmed => false,
    };
    if !applied {
        // The conditional update disagreed with the locked row; should
        // not happen under the lock, so fail loudly rather than guess.
        return Err(invalid(order.status, planned.target, "state changed during update"));
    }

    let items = orders::items(&mut *tx, order_id).await?;
    apply_ledger_effect(&mut tx, planned.ledger_effect, &items).await?;

    let updated = orders::lock(&mut tx, order_id)
        .await?
        .ok_or(TransitionError::NotFound)?;

    tx.commit().await.map_err(RepositoryError::Database)?;

    tracing::info!(
        order_id = %order_id,
        from = %order.status,
        to = %updated.status,
        effect = ?planned.ledger_effect,
        "order transition applied"
    );

    Ok(updated)
}

/// Cancel an order on behalf of its owner.
///
/// Same transition machinery as [`update_status`], plus an ownership
/// check: shoppers can only cancel their own orders.
///
/// # Errors
///
/// `OwnershipMismatch` for a foreign order, otherwise as
/// [`update_status`].
pub async fn cancel_order(
    pool: &PgPool,
    order_id: OrderId,
    requester: &OrderOwner,
    reason: String,
) -> Result<Order, TransitionError> {
    let current = orders::OrderRepository::new(pool)
        .get_with_items(order_id)
        .await?
        .ok_or(TransitionError::NotFound)?
        .0;

    if &current.owner != requester {
        tracing::warn!(
            order_id = %order_id,
            requester = %requester,
            "cancellation attempt by non-owner"
        );
        return Err(TransitionError::OwnershipMismatch);
    }

    update_status(
        pool,
        order_id,
        &TransitionRequest {
            target: OrderStatus::Cancelled,
            tracking_number: None,
            cancel_reason: Some(reason),
        },
    )
    .await
}

async fn apply_ledger_effect(
    tx: &mut sqlx::PgConnection,
    effect: LedgerEffect,
    items: &[OrderItem],
) -> Result<(), TransitionError> {
    match effect {
        LedgerEffect::None => {}
        LedgerEffect::ReleaseReservation => {
            for item in items {
                inventory::release(tx, item.product_id, item.quantity).await?;
            }
        }
        LedgerEffect::Restock => {
            for item in items {
                inventory::restock(tx, item.product_id, item.quantity).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use chrono::Utc;
    use heron_core::{Email, Money};

    fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        Order {
            id: OrderId::new(7),
            order_number: "ORD-20260829-QQQQQQ".to_owned(),
            owner: OrderOwner::Guest(Email::parse("g@example.com").expect("email")),
            status,
            payment_status,
            subtotal: Money::from_minor(5000),
            shipping: Money::from_minor(599),
            tax: Money::from_minor(413),
            total: Money::from_minor(6012),
            shipping_address: Address {
                name: "G Shopper".to_owned(),
                line1: "1 Main St".to_owned(),
                line2: None,
                city: "Portland".to_owned(),
                region: "OR".to_owned(),
                postal_code: "97201".to_owned(),
                country: "US".to_owned(),
            },
            tracking_number: None,
            cancel_reason: None,
            created_at: Utc::now(),
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            reservation_released_at: None,
        }
    }

    fn request(target: OrderStatus) -> TransitionRequest {
        TransitionRequest {
            target,
            ..TransitionRequest::default()
        }
    }

    #[test]
    fn shipping_requires_a_tracking_number() {
        let order = order(OrderStatus::Processing, PaymentStatus::Paid);

        let err = plan_transition(&order, &request(OrderStatus::Shipped)).expect_err("no tracking");
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));

        let mut with_tracking = request(OrderStatus::Shipped);
        with_tracking.tracking_number = Some("1Z999AA10123456784".to_owned());
        let planned = plan_transition(&order, &with_tracking).expect("valid");
        assert_eq!(planned.ledger_effect, LedgerEffect::None);
        assert_eq!(
            planned.tracking_number.as_deref(),
            Some("1Z999AA10123456784")
        );
    }

    #[test]
    fn blank_tracking_number_is_rejected() {
        let order = order(OrderStatus::Processing, PaymentStatus::Paid);
        let mut req = request(OrderStatus::Shipped);
        req.tracking_number = Some("   ".to_owned());
        assert!(plan_transition(&order, &req).is_err());
    }

    #[test]
    fn cancellation_requires_a_reason() {
        let order = order(OrderStatus::Pending, PaymentStatus::Pending);
        let err = plan_transition(&order, &request(OrderStatus::Cancelled)).expect_err("no reason");
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn pre_payment_cancellation_releases_the_reservation() {
        let order = order(OrderStatus::Pending, PaymentStatus::Pending);
        let mut req = request(OrderStatus::Cancelled);
        req.cancel_reason = Some("changed my mind".to_owned());
        let planned = plan_transition(&order, &req).expect("valid");
        assert_eq!(planned.ledger_effect, LedgerEffect::ReleaseReservation);
    }

    #[test]
    fn post_payment_cancellation_restocks_instead() {
        let order = order(OrderStatus::Confirmed, PaymentStatus::Paid);
        let mut req = request(OrderStatus::Cancelled);
        req.cancel_reason = Some("customer return".to_owned());
        let planned = plan_transition(&order, &req).expect("valid");
        assert_eq!(planned.ledger_effect, LedgerEffect::Restock);
    }

    #[test]
    fn cancelling_after_sweep_moves_no_counters() {
        let mut swept = order(OrderStatus::Pending, PaymentStatus::Pending);
        swept.reservation_released_at = Some(Utc::now());
        let mut req = request(OrderStatus::Cancelled);
        req.cancel_reason = Some("cleanup".to_owned());
        let planned = plan_transition(&swept, &req).expect("valid");
        assert_eq!(planned.ledger_effect, LedgerEffect::None);
    }

    #[test]
    fn cancelling_a_delivered_order_is_rejected() {
        let order = order(OrderStatus::Delivered, PaymentStatus::Paid);
        let mut req = request(OrderStatus::Cancelled);
        req.cancel_reason = Some("too late".to_owned());
        let err = plan_transition(&order, &req).expect_err("terminal");
        assert!(matches!(
            err,
            TransitionError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn clients_cannot_drive_payment_confirmation() {
        let order = order(OrderStatus::Pending, PaymentStatus::Pending);
        let err = plan_transition(&order, &request(OrderStatus::Confirmed)).expect_err("guarded");
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn delivery_leaves_committed_stock_alone() {
        // Confirmation already committed the whole hold; by delivery any
        // `reserved` units on the product belong to other orders.
        let order = order(OrderStatus::Shipped, PaymentStatus::Paid);
        let planned = plan_transition(&order, &request(OrderStatus::Delivered)).expect("valid");
        assert_eq!(planned.ledger_effect, LedgerEffect::None);
    }
}
