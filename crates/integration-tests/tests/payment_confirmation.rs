//! Webhook verification tests.
//!
//! Payment notifications arrive at-least-once from an external party,
//! so every claim they carry is checked against the stored order before
//! anything is mutated. These tests cover the verification gate and the
//! wire format.

#![allow(clippy::unwrap_used)]

use heron_core::{Email, Money, OrderOwner, PaymentStatus};
use heron_fulfillment::services::confirmation::{
    ConfirmationError, PaymentNotification, verify,
};
use heron_integration_tests::fixtures::pending_order;

fn matching_notification() -> PaymentNotification {
    PaymentNotification {
        event_id: "evt_8f2a91".to_owned(),
        event_type: "payment.confirmed".to_owned(),
        order_id: 42.into(),
        amount: Money::from_minor(6012),
        user_id: Some(7),
        guest_email: None,
    }
}

// =============================================================================
// Verification Gate
// =============================================================================

#[test]
fn test_valid_notification_passes() {
    let order = pending_order();
    // Ok(true) means the order still needs confirming.
    assert!(verify(&order, &matching_notification()).unwrap());
}

#[test]
fn test_amount_must_match_exactly() {
    let order = pending_order();

    for tampered in [6011, 6013, 1, 0] {
        let mut notification = matching_notification();
        notification.amount = Money::from_minor(tampered);

        let err = verify(&order, &notification).unwrap_err();
        assert!(
            matches!(err, ConfirmationError::AmountMismatch),
            "amount {tampered} should be rejected"
        );
    }
}

#[test]
fn test_wrong_user_rejected() {
    let order = pending_order();
    let mut notification = matching_notification();
    notification.user_id = Some(8);

    let err = verify(&order, &notification).unwrap_err();
    assert!(matches!(err, ConfirmationError::OwnershipMismatch));
}

#[test]
fn test_guest_claim_against_user_order_rejected() {
    let order = pending_order();
    let mut notification = matching_notification();
    notification.user_id = None;
    notification.guest_email = Some("someone@example.com".to_owned());

    let err = verify(&order, &notification).unwrap_err();
    assert!(matches!(err, ConfirmationError::OwnershipMismatch));
}

#[test]
fn test_missing_identity_claim_rejected() {
    let order = pending_order();
    let mut notification = matching_notification();
    notification.user_id = None;

    let err = verify(&order, &notification).unwrap_err();
    assert!(matches!(err, ConfirmationError::OwnershipMismatch));
}

#[test]
fn test_guest_order_matched_by_email() {
    let mut order = pending_order();
    order.owner = OrderOwner::Guest(Email::parse("avery@example.com").unwrap());

    let mut notification = matching_notification();
    notification.user_id = None;
    notification.guest_email = Some("avery@example.com".to_owned());

    assert!(verify(&order, &notification).unwrap());
}

#[test]
fn test_already_paid_order_verifies_as_duplicate() {
    // A redelivered event for a paid order is valid but a no-op:
    // Ok(false) tells the handler to acknowledge without acting.
    let mut order = pending_order();
    order.payment_status = PaymentStatus::Paid;

    assert!(!verify(&order, &matching_notification()).unwrap());
}

// =============================================================================
// Wire Format
// =============================================================================

#[test]
fn test_notification_deserializes_from_provider_json() {
    let notification: PaymentNotification = serde_json::from_str(
        r#"{
            "event_id": "evt_8f2a91",
            "event_type": "payment.confirmed",
            "order_id": 42,
            "amount": 6012,
            "user_id": 7
        }"#,
    )
    .unwrap();

    assert_eq!(notification.event_id, "evt_8f2a91");
    assert_eq!(notification.order_id, 42.into());
    assert_eq!(notification.amount, Money::from_minor(6012));
    assert_eq!(notification.user_id, Some(7));
    assert_eq!(notification.guest_email, None);
}

#[test]
fn test_unknown_event_types_still_parse() {
    // The handler acknowledges and ignores types it does not act on,
    // so parsing must not depend on the type.
    let notification: PaymentNotification = serde_json::from_str(
        r#"{
            "event_id": "evt_0001",
            "event_type": "payment.method_attached",
            "order_id": 42,
            "amount": 0,
            "guest_email": "avery@example.com"
        }"#,
    )
    .unwrap();

    assert_eq!(notification.event_type, "payment.method_attached");
}
