//! Order aggregate: an order, its line items, and the address snapshot.

use chrono::{DateTime, Utc};
use heron_core::{Money, OrderId, OrderItemId, OrderOwner, OrderStatus, PaymentStatus, ProductId};
use serde::{Deserialize, Serialize};

/// A shipping address snapshot.
///
/// Copied onto the order at creation time so later edits to a customer's
/// address book cannot change where an in-flight order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

/// An order.
///
/// Immutable after creation except for the status fields and the
/// timestamps their transitions stamp. Totals are computed once from
/// server-trusted prices; line items and the address snapshot never
/// change.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Externally visible, human-shareable identifier.
    pub order_number: String,
    pub owner: OrderOwner,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    pub shipping_address: Address,
    pub tracking_number: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// When the reservation hold was returned to the pool, if ever
    /// (expiry sweep or pre-payment cancellation).
    pub reservation_released_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether the reservation backing this order still exists.
    ///
    /// Payment confirmation requires it; once the sweeper has reclaimed
    /// the hold the order can no longer be confirmed.
    #[must_use]
    pub const fn reservation_held(&self) -> bool {
        self.reservation_released_at.is_none()
    }
}

/// A line item with its price and name snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Name at order time, for user-facing messages without a catalog join.
    pub product_name: String,
    pub quantity: i32,
    /// Unit price at order time, immune to later catalog price changes.
    pub unit_price: Money,
}
