//! Order state machine tests across the core and fulfillment crates.
//!
//! These pin down which transitions the administrative endpoint accepts
//! and what each one does to the inventory ledger, without a database:
//! `plan_transition` is the single gate in front of every status
//! mutation.

#![allow(clippy::unwrap_used)]

use heron_core::{Email, OrderOwner, OrderStatus, PaymentStatus};
use heron_fulfillment::services::orders::{
    LedgerEffect, TransitionError, TransitionRequest, plan_transition,
};
use heron_integration_tests::fixtures::{order_in, pending_order};

fn request(target: OrderStatus) -> TransitionRequest {
    TransitionRequest {
        target,
        tracking_number: None,
        cancel_reason: None,
    }
}

// =============================================================================
// Happy Path
// =============================================================================

#[test]
fn test_full_lifecycle_is_reachable() {
    // pending -> confirmed -> processing -> shipped -> delivered
    let path = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];

    for pair in path.windows(2) {
        assert!(
            pair[0].can_transition_to(pair[1]),
            "{} should reach {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_confirmed_to_processing_moves_no_stock() {
    let order = order_in(OrderStatus::Confirmed);
    let planned = plan_transition(&order, &request(OrderStatus::Processing)).unwrap();

    assert_eq!(planned.target, OrderStatus::Processing);
    assert_eq!(planned.ledger_effect, LedgerEffect::None);
}

#[test]
fn test_shipping_requires_tracking_number() {
    let order = order_in(OrderStatus::Processing);

    let err = plan_transition(&order, &request(OrderStatus::Shipped)).unwrap_err();
    assert!(matches!(err, TransitionError::InvalidTransition { .. }));

    let planned = plan_transition(
        &order,
        &TransitionRequest {
            target: OrderStatus::Shipped,
            tracking_number: Some("1Z999AA10123456784".to_owned()),
            cancel_reason: None,
        },
    )
    .unwrap();
    assert_eq!(planned.tracking_number.as_deref(), Some("1Z999AA10123456784"));
}

#[test]
fn test_blank_tracking_number_rejected() {
    let order = order_in(OrderStatus::Processing);
    let result = plan_transition(
        &order,
        &TransitionRequest {
            target: OrderStatus::Shipped,
            tracking_number: Some("   ".to_owned()),
            cancel_reason: None,
        },
    );
    assert!(result.is_err());
}

#[test]
fn test_delivery_moves_no_inventory_counters() {
    // The order's hold was fully committed at payment confirmation, so
    // delivering it must not release anything: `reserved` on the product
    // now counts other orders' holds, and an aggregate release here
    // would let a later checkout double-sell their units.
    let order = order_in(OrderStatus::Shipped);
    let planned = plan_transition(&order, &request(OrderStatus::Delivered)).unwrap();
    assert_eq!(planned.ledger_effect, LedgerEffect::None);
}

// =============================================================================
// Guards
// =============================================================================

#[test]
fn test_confirmation_never_available_administratively() {
    // Only the payment webhook may confirm, even though the status graph
    // itself allows pending -> confirmed.
    let order = pending_order();
    let err = plan_transition(&order, &request(OrderStatus::Confirmed)).unwrap_err();
    assert!(matches!(err, TransitionError::InvalidTransition { .. }));
}

#[test]
fn test_no_skipping_forward() {
    let order = pending_order();
    for target in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        assert!(
            plan_transition(&order, &request(target)).is_err(),
            "pending should not jump to {target}"
        );
    }
}

#[test]
fn test_no_moving_backward() {
    let order = order_in(OrderStatus::Shipped);
    for target in [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
    ] {
        assert!(plan_transition(&order, &request(target)).is_err());
    }
}

#[test]
fn test_terminal_states_are_frozen() {
    for terminal in [
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ] {
        assert!(terminal.is_terminal());
        let order = order_in(terminal);
        for target in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            // Delivered is terminal for everything except a refund.
            if terminal == OrderStatus::Delivered && target == OrderStatus::Refunded {
                continue;
            }
            assert!(
                plan_transition(&order, &request(target)).is_err(),
                "{terminal} should not reach {target}"
            );
        }
    }
}

// =============================================================================
// Cancellation and the Ledger
// =============================================================================

#[test]
fn test_cancellation_requires_reason() {
    let order = pending_order();
    let err = plan_transition(&order, &request(OrderStatus::Cancelled)).unwrap_err();
    assert!(matches!(err, TransitionError::InvalidTransition { .. }));
}

fn cancel_request() -> TransitionRequest {
    TransitionRequest {
        target: OrderStatus::Cancelled,
        tracking_number: None,
        cancel_reason: Some("changed my mind".to_owned()),
    }
}

#[test]
fn test_unpaid_cancellation_releases_reservation() {
    let order = pending_order();
    assert_eq!(order.payment_status, PaymentStatus::Pending);

    let planned = plan_transition(&order, &cancel_request()).unwrap();
    assert_eq!(planned.ledger_effect, LedgerEffect::ReleaseReservation);
}

#[test]
fn test_paid_cancellation_restocks() {
    // After payment the reservation was committed, so cancelling must
    // put units back into sellable stock rather than un-reserve them.
    for status in [OrderStatus::Confirmed, OrderStatus::Processing] {
        let order = order_in(status);
        let planned = plan_transition(&order, &cancel_request()).unwrap();
        assert_eq!(planned.ledger_effect, LedgerEffect::Restock);
    }
}

#[test]
fn test_swept_order_cancellation_moves_nothing() {
    // The sweeper already returned the hold; cancelling afterwards must
    // not release it a second time.
    let mut order = pending_order();
    order.reservation_released_at = order.created_at.checked_add_signed(chrono::Duration::hours(1));

    let planned = plan_transition(&order, &cancel_request()).unwrap();
    assert_eq!(planned.ledger_effect, LedgerEffect::None);
}

#[test]
fn test_shipped_orders_cannot_be_cancelled() {
    for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
        let order = order_in(status);
        assert!(plan_transition(&order, &cancel_request()).is_err());
    }
}

#[test]
fn test_refund_restocks() {
    let order = order_in(OrderStatus::Delivered);
    let planned = plan_transition(&order, &request(OrderStatus::Refunded)).unwrap();
    assert_eq!(planned.ledger_effect, LedgerEffect::Restock);
}

#[test]
fn test_refund_requires_payment_history() {
    // Pending orders were never paid; there is nothing to refund.
    let order = pending_order();
    assert!(plan_transition(&order, &request(OrderStatus::Refunded)).is_err());
}

// =============================================================================
// Owner Identity
// =============================================================================

#[test]
fn test_owner_equality_distinguishes_user_and_guest() {
    let user = OrderOwner::User(7.into());
    let other_user = OrderOwner::User(8.into());
    let guest = OrderOwner::Guest(Email::parse("avery@example.com").unwrap());

    assert_eq!(user, OrderOwner::User(7.into()));
    assert_ne!(user, other_user);
    assert_ne!(user, guest);
}
