//! Order lifecycle types
//!
//! Orders are mutated only by the settlement coordinator (fills) or the
//! explicit cancel path. Filled and Cancelled are terminal.

use crate::ids::{OrderId, OwnerId, ZoneId};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (demand, escrows currency tokens)
    BUY,
    /// Sell order (supply, escrows energy tokens)
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

/// Order type; this core is a continuous double auction over limit orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    LIMIT,
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Resting in the book, no fills yet
    Open,
    /// Resting in the book with some fills
    PartiallyFilled,
    /// Completely matched (terminal)
    Filled,
    /// Cancelled by owner; remaining escrow released (terminal)
    Cancelled,
}

impl OrderStatus {
    /// Check if status is terminal (no further mutation permitted)
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

/// A limit order within a single zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub owner_id: OwnerId,
    pub zone_id: ZoneId,
    pub side: Side,
    pub order_type: OrderType,
    pub price_per_unit: Price,
    pub total_amount: Quantity,
    pub filled_amount: Quantity,
    pub status: OrderStatus,
    pub created_at: i64, // Unix nanos; time priority, never reset by fills
}

impl Order {
    /// Create a new open order
    pub fn new(
        owner_id: OwnerId,
        zone_id: ZoneId,
        side: Side,
        price_per_unit: Price,
        total_amount: Quantity,
        created_at: i64,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            owner_id,
            zone_id,
            side,
            order_type: OrderType::LIMIT,
            price_per_unit,
            total_amount,
            filled_amount: Quantity::zero(),
            status: OrderStatus::Open,
            created_at,
        }
    }

    /// Unfilled remainder
    pub fn remaining(&self) -> Quantity {
        self.total_amount.saturating_sub(self.filled_amount)
    }

    /// Check quantity invariant: filled <= total
    pub fn check_invariant(&self) -> bool {
        self.filled_amount <= self.total_amount
            && (self.filled_amount == self.total_amount) == (self.status == OrderStatus::Filled)
    }

    /// Check if order is completely filled
    pub fn is_filled(&self) -> bool {
        self.filled_amount == self.total_amount
    }

    /// Apply a settled fill and adjust status
    ///
    /// # Panics
    /// Panics if the fill would exceed the total amount or the order is
    /// already terminal; the settlement coordinator sizes fills from
    /// remaining amounts, so either indicates a bug upstream.
    pub fn add_fill(&mut self, fill_amount: Quantity) {
        assert!(!self.status.is_terminal(), "Cannot fill terminal order");
        let new_filled = self.filled_amount + fill_amount;
        assert!(
            new_filled <= self.total_amount,
            "Fill would exceed order amount"
        );

        self.filled_amount = new_filled;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };

        assert!(self.check_invariant(), "Invariant violated after fill");
    }

    /// Cancel the order
    ///
    /// # Panics
    /// Panics if the order is already in a terminal state; callers check
    /// terminality under the zone lock first.
    pub fn cancel(&mut self) {
        assert!(!self.status.is_terminal(), "Cannot cancel terminal order");
        self.status = OrderStatus::Cancelled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: Side, price: &str, amount: &str) -> Order {
        Order::new(
            OwnerId::new(),
            ZoneId::new(1),
            side,
            Price::from_str(price).unwrap(),
            Quantity::from_str(amount).unwrap(),
            1708123456789000000,
        )
    }

    #[test]
    fn test_order_creation() {
        let o = order(Side::SELL, "2.0", "10");
        assert_eq!(o.status, OrderStatus::Open);
        assert_eq!(o.remaining(), Quantity::from_str("10").unwrap());
        assert!(o.check_invariant());
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::BUY.opposite(), Side::SELL);
        assert_eq!(Side::SELL.opposite(), Side::BUY);
    }

    #[test]
    fn test_partial_then_full_fill() {
        let mut o = order(Side::BUY, "3.0", "10");

        o.add_fill(Quantity::from_str("4").unwrap());
        assert_eq!(o.status, OrderStatus::PartiallyFilled);
        assert_eq!(o.remaining(), Quantity::from_str("6").unwrap());

        o.add_fill(Quantity::from_str("6").unwrap());
        assert_eq!(o.status, OrderStatus::Filled);
        assert!(o.remaining().is_zero());
        assert!(o.check_invariant());
    }

    #[test]
    #[should_panic(expected = "Fill would exceed order amount")]
    fn test_overfill_panics() {
        let mut o = order(Side::BUY, "3.0", "10");
        o.add_fill(Quantity::from_str("11").unwrap());
    }

    #[test]
    fn test_cancel() {
        let mut o = order(Side::SELL, "2.0", "5");
        o.cancel();
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert!(o.status.is_terminal());
    }

    #[test]
    #[should_panic(expected = "Cannot cancel terminal order")]
    fn test_cancel_filled_panics() {
        let mut o = order(Side::SELL, "2.0", "5");
        o.add_fill(Quantity::from_str("5").unwrap());
        o.cancel();
    }

    #[test]
    fn test_order_serialization() {
        let o = order(Side::SELL, "2.5", "7.5");
        let json = serde_json::to_string(&o).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(o, back);
    }
}
