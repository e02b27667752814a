//! Buy-side order book
//!
//! Maintains buy orders sorted by price descending (best bid first).
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use types::ids::{OrderId, OwnerId};
use types::numeric::{Price, Quantity};

use super::price_level::{LevelEntry, PriceLevel};

/// Buy side of a zone's order book
///
/// Price levels sorted ascending in the map; the best (highest) bid is the
/// last key. At each price level, orders are maintained in FIFO order.
#[derive(Debug, Clone, Default)]
pub struct BuyBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BuyBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Insert an order into the buy book
    pub fn insert(
        &mut self,
        price: Price,
        order_id: OrderId,
        owner_id: OwnerId,
        remaining: Quantity,
        created_at: i64,
    ) {
        self.levels
            .entry(price)
            .or_default()
            .insert(order_id, owner_id, remaining, created_at);
    }

    /// Remove an order from the buy book
    ///
    /// Returns true if the order was found and removed
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> bool {
        if let Some(level) = self.levels.get_mut(&price) {
            if level.remove(order_id).is_some() {
                if level.is_empty() {
                    self.levels.remove(&price);
                }
                return true;
            }
        }
        false
    }

    /// Front order of the best (highest) bid level
    pub fn best(&self) -> Option<(Price, &LevelEntry)> {
        self.levels
            .iter()
            .next_back()
            .and_then(|(price, level)| level.peek_front().map(|entry| (*price, entry)))
    }

    /// Apply a fill to the front order of the best level
    pub fn fill_best(&mut self, fill: Quantity) {
        if let Some((price, level)) = self.levels.iter_mut().next_back() {
            let price = *price;
            level.fill_front(fill);
            if level.is_empty() {
                self.levels.remove(&price);
            }
        }
    }

    /// Check if the buy book is empty
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Total number of price levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}
