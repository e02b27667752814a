//! Fixed-point decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! `Price` is strictly positive, `Quantity` is non-negative; both validate at
//! construction so the accounting paths never re-check signs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Price per unit (currency tokens per kWh)
///
/// Invariant: strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a Price from a Decimal, returning None unless it is positive
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create a Price from an integer number of currency units
    ///
    /// # Panics
    /// Panics if `value` is zero
    pub fn from_u64(value: u64) -> Self {
        Self::try_new(Decimal::from(value)).expect("Price must be positive")
    }

    /// Parse a Price from a decimal string
    pub fn from_str(s: &str) -> Option<Self> {
        s.parse::<Decimal>().ok().and_then(Self::try_new)
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Trade value of `quantity` units at this price
    pub fn value_of(&self, quantity: Quantity) -> Decimal {
        self.0 * quantity.as_decimal()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quantity of energy (kWh) or tokens
///
/// Invariant: non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    /// The zero quantity
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create a Quantity from a Decimal, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create a strictly positive Quantity, returning None if `value <= 0`
    pub fn try_new_positive(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Parse a Quantity from a decimal string
    pub fn from_str(s: &str) -> Option<Self> {
        s.parse::<Decimal>().ok().and_then(Self::try_new)
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Check for zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, returning None if the result would be negative
    pub fn checked_sub(&self, other: Quantity) -> Option<Quantity> {
        Self::try_new(self.0 - other.0)
    }

    /// Subtract, clamping at zero
    pub fn saturating_sub(&self, other: Quantity) -> Quantity {
        self.checked_sub(other).unwrap_or_else(Quantity::zero)
    }

    /// The smaller of two quantities
    pub fn min(self, other: Quantity) -> Quantity {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, other: Quantity) -> Quantity {
        Quantity(self.0 + other.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_price_positive_only() {
        assert!(Price::try_new(Decimal::from(5)).is_some());
        assert!(Price::try_new(Decimal::ZERO).is_none());
        assert!(Price::try_new(Decimal::from(-1)).is_none());
    }

    #[test]
    fn test_price_from_str() {
        let p = Price::from_str("2.5").unwrap();
        assert_eq!(p.as_decimal(), Decimal::new(25, 1));
        assert!(Price::from_str("0").is_none());
        assert!(Price::from_str("garbage").is_none());
    }

    #[test]
    fn test_price_value_of() {
        let p = Price::from_str("2.0").unwrap();
        let q = Quantity::from_str("10").unwrap();
        assert_eq!(p.value_of(q), Decimal::from(20));
    }

    #[test]
    fn test_quantity_non_negative() {
        assert!(Quantity::try_new(Decimal::ZERO).is_some());
        assert!(Quantity::try_new(Decimal::from(-1)).is_none());
        assert!(Quantity::try_new_positive(Decimal::ZERO).is_none());
    }

    #[test]
    fn test_quantity_arithmetic() {
        let a = Quantity::from_str("3.5").unwrap();
        let b = Quantity::from_str("1.5").unwrap();

        assert_eq!(a + b, Quantity::from_str("5.0").unwrap());
        assert_eq!(a.checked_sub(b), Quantity::from_str("2.0"));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(b.saturating_sub(a), Quantity::zero());
        assert_eq!(a.min(b), b);
    }

    #[test]
    fn test_quantity_serialization() {
        let q = Quantity::from_str("12.34").unwrap();
        let json = serde_json::to_string(&q).unwrap();
        let back: Quantity = serde_json::from_str(&json).unwrap();
        assert_eq!(q, back);
    }

    proptest! {
        #[test]
        fn prop_saturating_sub_never_negative(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let qa = Quantity::try_new(Decimal::from(a)).unwrap();
            let qb = Quantity::try_new(Decimal::from(b)).unwrap();
            prop_assert!(qa.saturating_sub(qb).as_decimal() >= Decimal::ZERO);
        }

        #[test]
        fn prop_min_is_lower_bound(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let qa = Quantity::try_new(Decimal::from(a)).unwrap();
            let qb = Quantity::try_new(Decimal::from(b)).unwrap();
            let m = qa.min(qb);
            prop_assert!(m <= qa && m <= qb);
        }
    }
}
