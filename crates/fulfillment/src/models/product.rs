//! Product inventory model.

use chrono::{DateTime, Utc};
use heron_core::{Money, ProductId};
use serde::Serialize;

/// A sellable product with its inventory counters.
///
/// `stock` is the total sellable units; `reserved` is the portion held by
/// unconfirmed orders. The ledger invariant `0 <= reserved <= stock` is
/// enforced by every mutation and backed by a database CHECK constraint.
/// `stock` only drops when a reservation converts into a confirmed sale.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Unit price in minor currency units, the only price checkout trusts.
    pub price: Money,
    pub stock: i32,
    pub reserved: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Units offerable to new reservations.
    #[must_use]
    pub const fn available(&self) -> i32 {
        self.stock - self.reserved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i32, reserved: i32) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Canvas Tote".to_owned(),
            price: Money::from_minor(2400),
            stock,
            reserved,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn available_is_stock_minus_reserved() {
        assert_eq!(product(5, 0).available(), 5);
        assert_eq!(product(5, 3).available(), 2);
        assert_eq!(product(4, 4).available(), 0);
    }
}
