//! Sell-side order book
//!
//! Maintains sell orders sorted by price ascending (best ask first).

use std::collections::BTreeMap;
use types::ids::{OrderId, OwnerId};
use types::numeric::{Price, Quantity};

use super::price_level::{LevelEntry, PriceLevel};

/// Sell side of a zone's order book
///
/// Price levels sorted ascending; the best (lowest) ask is the first key.
/// At each price level, orders are maintained in FIFO order.
#[derive(Debug, Clone, Default)]
pub struct SellBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl SellBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Insert an order into the sell book
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

    /// Remove an order from the sell book
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

    /// Front order of the best (lowest) ask level
    pub fn best(&self) -> Option<(Price, &LevelEntry)> {
        self.levels
            .iter()
            .next()
            .and_then(|(price, level)| level.peek_front().map(|entry| (*price, entry)))
    }

    /// Apply a fill to the front order of the best level
    pub fn fill_best(&mut self, fill: Quantity) {
        if let Some((price, level)) = self.levels.iter_mut().next() {
            let price = *price;
            level.fill_front(fill);
            if level.is_empty() {
                self.levels.remove(&price);
            }
        }
    }

    /// Check if the sell book is empty
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Total number of price levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(s: &str) -> Price {
        Price::from_str(s).unwrap()
    }

    fn qty(s: &str) -> Quantity {
        Quantity::from_str(s).unwrap()
    }

    #[test]
    fn test_best_is_lowest_price() {
        let mut book = SellBook::new();
        book.insert(price("2.0"), OrderId::new(), OwnerId::new(), qty("1"), 1);
        book.insert(price("1.5"), OrderId::new(), OwnerId::new(), qty("2"), 2);
        book.insert(price("3.0"), OrderId::new(), OwnerId::new(), qty("3"), 3);

        let (best_price, entry) = book.best().unwrap();
        assert_eq!(best_price, price("1.5"));
        assert_eq!(entry.remaining, qty("2"));
    }

    #[test]
    fn test_remove_clears_empty_level() {
        let mut book = SellBook::new();
        let id = OrderId::new();
        book.insert(price("2.0"), id, OwnerId::new(), qty("1"), 1);

        assert!(book.remove(&id, price("2.0")));
        assert!(book.is_empty());
    }

    #[test]
    fn test_fill_best_consumes_level() {
        let mut book = SellBook::new();
        book.insert(price("1.5"), OrderId::new(), OwnerId::new(), qty("2"), 1);
        book.insert(price("2.0"), OrderId::new(), OwnerId::new(), qty("1"), 2);

        book.fill_best(qty("2"));
        let (best_price, _) = book.best().unwrap();
        assert_eq!(best_price, price("2.0"));
    }
}
