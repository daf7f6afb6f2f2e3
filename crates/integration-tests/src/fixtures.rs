//! Shared builders for test orders and pricing policies.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};

use heron_core::{Money, OrderId, OrderOwner, OrderStatus, PaymentStatus, UserId};
use heron_fulfillment::config::PricingPolicy;
use heron_fulfillment::models::{Address, Order};

/// The default pricing policy: $5.99 flat shipping waived at $75.00,
/// 8.25% tax, $5.00 minimum order.
#[must_use]
pub fn default_policy() -> PricingPolicy {
    PricingPolicy {
        shipping_flat_fee: Money::from_minor(599),
        free_shipping_threshold: Money::from_minor(7500),
        tax_basis_points: 825,
        minimum_order: Money::from_minor(500),
    }
}

#[must_use]
pub fn test_address() -> Address {
    Address {
        name: "Avery Quinn".to_owned(),
        line1: "400 Harbor Way".to_owned(),
        line2: None,
        city: "Portland".to_owned(),
        region: "OR".to_owned(),
        postal_code: "97204".to_owned(),
        country: "US".to_owned(),
    }
}

/// A pending, unpaid order owned by user 7 with a live reservation.
///
/// Totals correspond to a $50.00 subtotal under [`default_policy`].
#[must_use]
pub fn pending_order() -> Order {
    Order {
        id: OrderId::new(42),
        order_number: "ORD-20260829-7KQ2MX".to_owned(),
        owner: OrderOwner::User(UserId::new(7)),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        subtotal: Money::from_minor(5000),
        shipping: Money::from_minor(599),
        tax: Money::from_minor(413),
        total: Money::from_minor(6012),
        shipping_address: test_address(),
        tracking_number: None,
        cancel_reason: None,
        created_at: Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap(),
        shipped_at: None,
        delivered_at: None,
        cancelled_at: None,
        reservation_released_at: None,
    }
}

/// [`pending_order`] advanced to a given status, with payment marked
/// paid for any post-confirmation status.
#[must_use]
pub fn order_in(status: OrderStatus) -> Order {
    let mut order = pending_order();
    order.status = status;
    if !matches!(status, OrderStatus::Pending) {
        order.payment_status = PaymentStatus::Paid;
    }
    order
}
