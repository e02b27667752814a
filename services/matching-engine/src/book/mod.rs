//! Order book infrastructure
//!
//! Price levels, the two book sides and the per-zone pairing of them.
//! The book only ever holds open or partially filled orders; terminal
//! orders are removed the moment they become terminal.

pub mod buy_book;
pub mod price_level;
pub mod sell_book;

pub use buy_book::BuyBook;
pub use price_level::{LevelEntry, PriceLevel};
pub use sell_book::SellBook;

use types::ids::{OrderId, OwnerId};
use types::numeric::{Price, Quantity};
use types::order::{Order, Side};

/// Copy of a side's front order, taken while the zone lock is held
#[derive(Debug, Clone, PartialEq)]
pub struct TopOfBook {
    pub order_id: OrderId,
    pub owner_id: OwnerId,
    pub price: Price,
    pub remaining: Quantity,
    pub created_at: i64,
}

/// Both sides of one zone's book
#[derive(Debug, Clone, Default)]
pub struct ZoneBook {
    pub bids: BuyBook,
    pub asks: SellBook,
}

impl ZoneBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an open order's remaining amount on its side
    pub fn insert(&mut self, order: &Order) {
        match order.side {
            Side::BUY => self.bids.insert(
                order.price_per_unit,
                order.order_id,
                order.owner_id,
                order.remaining(),
                order.created_at,
            ),
            Side::SELL => self.asks.insert(
                order.price_per_unit,
                order.order_id,
                order.owner_id,
                order.remaining(),
                order.created_at,
            ),
        }
    }

    /// Remove an order from its side; true if it was resting
    pub fn remove(&mut self, order_id: &OrderId, price: Price, side: Side) -> bool {
        match side {
            Side::BUY => self.bids.remove(order_id, price),
            Side::SELL => self.asks.remove(order_id, price),
        }
    }

    /// The crossing pair of tops, if one exists
    ///
    /// Returns `Some` only when `best_buy.price >= best_sell.price`.
    pub fn peek_matchable(&self) -> Option<(TopOfBook, TopOfBook)> {
        let (bid_price, bid) = self.bids.best()?;
        let (ask_price, ask) = self.asks.best()?;
        if bid_price < ask_price {
            return None;
        }
        Some((
            TopOfBook {
                order_id: bid.order_id,
                owner_id: bid.owner_id,
                price: bid_price,
                remaining: bid.remaining,
                created_at: bid.created_at,
            },
            TopOfBook {
                order_id: ask.order_id,
                owner_id: ask.owner_id,
                price: ask_price,
                remaining: ask.remaining,
                created_at: ask.created_at,
            },
        ))
    }

    /// Reduce both tops after a settled match
    pub fn apply_match(&mut self, matched: Quantity) {
        self.bids.fill_best(matched);
        self.asks.fill_best(matched);
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
