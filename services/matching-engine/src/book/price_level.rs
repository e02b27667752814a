//! Price level implementation with FIFO queue
//!
//! A price level contains all resting orders at a specific price point.
//! Orders are maintained in strict FIFO order to enforce time priority;
//! a partial fill updates the front entry in place and never re-queues it,
//! so time priority survives partial fills.

use std::collections::VecDeque;
use types::ids::{OrderId, OwnerId};
use types::numeric::Quantity;

/// A price level containing resting orders at a specific price
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    /// Queue of orders at this price level (FIFO order)
    orders: VecDeque<LevelEntry>,
    /// Total remaining quantity at this level
    total_quantity: Quantity,
}

/// Entry in the price level queue
#[derive(Debug, Clone)]
pub struct LevelEntry {
    pub order_id: OrderId,
    pub owner_id: OwnerId,
    pub remaining: Quantity,
    pub created_at: i64,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total_quantity: Quantity::zero(),
        }
    }

    /// Insert an order at the back of the queue (time priority)
    pub fn insert(&mut self, order_id: OrderId, owner_id: OwnerId, remaining: Quantity, created_at: i64) {
        self.orders.push_back(LevelEntry {
            order_id,
            owner_id,
            remaining,
            created_at,
        });
        self.total_quantity = self.total_quantity + remaining;
    }

    /// Remove an order from the queue by OrderId
    ///
    /// Returns the remaining quantity of the removed order, or None if not found
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Quantity> {
        let position = self
            .orders
            .iter()
            .position(|entry| &entry.order_id == order_id)?;
        let entry = self.orders.remove(position)?;
        self.total_quantity = self.total_quantity.saturating_sub(entry.remaining);
        Some(entry.remaining)
    }

    /// Peek at the front order without removing it
    pub fn peek_front(&self) -> Option<&LevelEntry> {
        self.orders.front()
    }

    /// Reduce the front order's remaining quantity after a fill
    ///
    /// Removes the entry automatically once fully consumed.
    pub fn fill_front(&mut self, fill: Quantity) -> bool {
        if let Some(entry) = self.orders.front_mut() {
            let new_remaining = entry.remaining.saturating_sub(fill);
            if new_remaining.is_zero() {
                self.orders.pop_front();
            } else {
                entry.remaining = new_remaining;
            }
            self.total_quantity = self.total_quantity.saturating_sub(fill);
            true
        } else {
            false
        }
    }

    /// Check if the price level is empty
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Get the total remaining quantity at this price level
    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    /// Get the number of orders at this level
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}
