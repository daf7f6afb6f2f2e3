//! Monetary amounts in minor currency units.
//!
//! All order math in the fulfillment core is integer arithmetic on minor
//! units (cents for USD). Floating point never touches a price.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use serde::{Deserialize, Serialize};

/// A monetary amount in minor currency units (e.g., cents).
///
/// Stored as a signed 64-bit integer; arithmetic helpers are checked so
/// that a pathological cart cannot silently overflow a total.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Create an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn as_minor(self) -> i64 {
        self.0
    }

    /// Checked addition.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked multiplication by a unit count (line item price * quantity).
    #[must_use]
    pub const fn checked_mul(self, quantity: i64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Apply a tax rate expressed in basis points (1/100th of a percent),
    /// rounding half up. `Money::from_minor(10000).tax(825)` is 825 minor
    /// units for an 8.25% rate.
    #[must_use]
    pub const fn tax(self, basis_points: i64) -> Self {
        // i64 * basis points fits in i128 with room to spare
        let numerator = self.0 as i128 * basis_points as i128;
        #[allow(clippy::cast_possible_truncation)]
        let rounded = ((numerator + 5_000) / 10_000) as i64;
        Self(rounded)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    /// Format as a dollar-style string, e.g. `$12.34`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_minor_units_with_two_decimals() {
        assert_eq!(Money::from_minor(12345).to_string(), "$123.45");
        assert_eq!(Money::from_minor(5).to_string(), "$0.05");
        assert_eq!(Money::from_minor(-250).to_string(), "-$2.50");
    }

    #[test]
    fn checked_mul_catches_overflow() {
        assert_eq!(
            Money::from_minor(200).checked_mul(3),
            Some(Money::from_minor(600))
        );
        assert_eq!(Money::from_minor(i64::MAX).checked_mul(2), None);
    }

    #[test]
    fn tax_rounds_half_up() {
        // 8.25% of $100.00 = $8.25 exactly
        assert_eq!(Money::from_minor(10000).tax(825), Money::from_minor(825));
        // 8.25% of $0.06 = 0.495 cents, rounds to 0 cents? 0.06 * 825 / 10000 = 0.495 -> 0
        assert_eq!(Money::from_minor(6).tax(825), Money::from_minor(0));
        // 10% of $0.05 = 0.5 cents, rounds up to 1 cent
        assert_eq!(Money::from_minor(5).tax(1000), Money::from_minor(1));
    }

    #[test]
    fn sums_line_totals() {
        let total: Money = [100, 250, 9]
            .into_iter()
            .map(Money::from_minor)
            .sum();
        assert_eq!(total, Money::from_minor(359));
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&Money::from_minor(12345)).expect("serialize");
        assert_eq!(json, "12345");
    }
}
