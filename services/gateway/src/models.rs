//! Request and response bodies
//!
//! Wire shapes are decoupled from the core types: decimals arrive as JSON
//! numbers or strings and are validated into `Price`/`Quantity` at the
//! handler boundary, zone ids travel as plain integers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use metering::MintOutcome;
use types::escrow::AssetKind;
use types::order::{Order, OrderStatus, OrderType, Side};
use types::reading::{MeterReading, MintStatus};
use types::trade::Trade;
use types::zone::ZoneStat;

#[derive(Debug, Deserialize)]
pub struct SubmitReadingRequest {
    pub meter_id: String,
    pub zone_id: i32,
    pub kwh: Decimal,
    /// Chain straight into minting after recording; defaults to the
    /// configured policy when omitted
    pub auto_mint: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ReadingResponse {
    pub reading_id: String,
    pub meter_id: String,
    pub zone_id: i32,
    pub kwh: Decimal,
    pub submitted_at: i64,
    pub mint_status: MintStatus,
    pub mint_tx_ref: Option<String>,
    pub mint_attempts: u32,
}

impl From<MeterReading> for ReadingResponse {
    fn from(r: MeterReading) -> Self {
        Self {
            reading_id: r.reading_id.to_string(),
            meter_id: r.meter_id.to_string(),
            zone_id: r.zone_id.as_i32(),
            kwh: r.kwh.as_decimal(),
            submitted_at: r.submitted_at,
            mint_status: r.mint_status,
            mint_tx_ref: r.mint_tx_ref,
            mint_attempts: r.mint_attempts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MintResponse {
    pub reading: ReadingResponse,
    pub mint_tx_ref: String,
    pub token_amount: Decimal,
}

impl From<MintOutcome> for MintResponse {
    fn from(outcome: MintOutcome) -> Self {
        Self {
            reading: outcome.reading.into(),
            mint_tx_ref: outcome.tx_ref,
            token_amount: outcome.token_amount,
        }
    }
}

/// Reading submission result; `mint` is populated only when auto-mint ran
/// and confirmed
#[derive(Debug, Serialize)]
pub struct SubmitReadingResponse {
    pub reading: ReadingResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint: Option<MintResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub side: Side,
    /// Only LIMIT is accepted; present so unsupported types reject loudly
    pub order_type: Option<OrderType>,
    pub zone_id: i32,
    pub amount: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub zone_id: i32,
    pub side: Side,
    pub order_type: OrderType,
    pub price_per_unit: Decimal,
    pub total_amount: Decimal,
    pub filled_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: i64,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            order_id: o.order_id.to_string(),
            zone_id: o.zone_id.as_i32(),
            side: o.side,
            order_type: o.order_type,
            price_per_unit: o.price_per_unit.as_decimal(),
            total_amount: o.total_amount.as_decimal(),
            filled_amount: o.filled_amount.as_decimal(),
            remaining_amount: o.remaining().as_decimal(),
            status: o.status,
            created_at: o.created_at,
        }
    }
}

/// Order creation result, including any trades the triggered matching pass
/// settled immediately
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: OrderResponse,
    pub trades: Vec<TradeResponse>,
}

#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub trade_id: String,
    pub sequence: u64,
    pub buy_order_id: String,
    pub sell_order_id: String,
    pub zone_id: i32,
    pub price_per_unit: Decimal,
    pub matched_amount: Decimal,
    pub trade_value: Decimal,
    pub settled_at: i64,
}

impl From<Trade> for TradeResponse {
    fn from(t: Trade) -> Self {
        Self {
            trade_id: t.trade_id.to_string(),
            sequence: t.sequence,
            buy_order_id: t.buy_order_id.to_string(),
            sell_order_id: t.sell_order_id.to_string(),
            zone_id: t.zone_id.as_i32(),
            price_per_unit: t.price_per_unit.as_decimal(),
            matched_amount: t.matched_amount.as_decimal(),
            trade_value: t.trade_value(),
            settled_at: t.settled_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub asset: AssetKind,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub energy_available: Decimal,
    pub currency_available: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ZoneStatusResponse {
    pub active_meter_count: u64,
    pub total_generated_kwh: Decimal,
    pub total_consumed_kwh: Decimal,
    pub last_updated: i64,
    pub matching_halted: bool,
}

impl ZoneStatusResponse {
    pub fn from_stat(stat: ZoneStat, matching_halted: bool) -> Self {
        Self {
            active_meter_count: stat.active_meter_count,
            total_generated_kwh: stat.total_generated_kwh,
            total_consumed_kwh: stat.total_consumed_kwh,
            last_updated: stat.last_updated,
            matching_halted,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GridStatusResponse {
    pub active_meters: u64,
    pub zones: BTreeMap<i32, ZoneStatusResponse>,
}
