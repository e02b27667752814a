//! Trade settlement record
//!
//! A Trade is created exactly once per match event and never mutated; it is
//! the durable record of what the settlement coordinator executed.

use crate::ids::{OrderId, TradeId, ZoneId};
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An immutable record of a settled match between one buy and one sell order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    /// Engine-global monotonic settlement sequence
    pub sequence: u64,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub zone_id: ZoneId,
    pub price_per_unit: Price,
    pub matched_amount: Quantity,
    pub settled_at: i64, // Unix nanos
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence: u64,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        zone_id: ZoneId,
        price_per_unit: Price,
        matched_amount: Quantity,
        settled_at: i64,
    ) -> Self {
        Self {
            trade_id: TradeId::new(),
            sequence,
            buy_order_id,
            sell_order_id,
            zone_id,
            price_per_unit,
            matched_amount,
            settled_at,
        }
    }

    /// Currency value moved by this trade (amount x price)
    pub fn trade_value(&self) -> Decimal {
        self.price_per_unit.value_of(self.matched_amount)
    }
}
