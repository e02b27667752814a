//! Crossing detection and execution pricing
//!
//! A buy and a sell can match when the bid price is at least the ask
//! price. The execution price is the resting order's price: the order
//! that arrived earlier between the two tops, so the taker never pays
//! worse than the maker's quoted price. On exactly simultaneous arrival
//! the sell side's price wins (deterministic, documented convention).

use crate::book::TopOfBook;
use types::numeric::Price;

/// Check if a bid and ask can match at given prices
pub fn can_match(bid_price: Price, ask_price: Price) -> bool {
    bid_price >= ask_price
}

/// Execution price for a crossing pair of tops
pub fn execution_price(buy_top: &TopOfBook, sell_top: &TopOfBook) -> Price {
    if buy_top.created_at < sell_top.created_at {
        buy_top.price
    } else {
        // Later buy, or exactly simultaneous arrival: sell price wins
        sell_top.price
    }
}
