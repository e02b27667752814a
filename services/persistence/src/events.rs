//! Journaled event taxonomy
//!
//! One `EngineEvent` is appended per successful state mutation. Replaying
//! the sequence from an empty state reproduces the readings ledger, owner
//! balances, open orders and the trade log exactly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::escrow::AssetKind;
use types::ids::{OrderId, OwnerId, ReadingId};
use types::reading::{MeterReading, MintStatus};
use types::order::Order;
use types::trade::Trade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A meter reading was validated and recorded
    ReadingRecorded(MeterReading),
    /// A reading moved through the mint lifecycle
    MintStatusChanged {
        reading_id: ReadingId,
        status: MintStatus,
        mint_tx_ref: Option<String>,
        mint_attempts: u32,
    },
    /// Available balance was credited (deposit or mint proceeds)
    BalanceDeposited {
        owner_id: OwnerId,
        asset: AssetKind,
        amount: Decimal,
    },
    /// An order passed validation, in its pre-matching state
    OrderAccepted(Order),
    /// The order's full notional moved from available balance into escrow
    EscrowLocked {
        owner_id: OwnerId,
        order_id: OrderId,
        asset: AssetKind,
        amount: Decimal,
    },
    /// An order was cancelled by its owner
    OrderCancelled { owner_id: OwnerId, order_id: OrderId },
    /// Remaining escrow returned to the owner's available balance
    EscrowReleased { owner_id: OwnerId, order_id: OrderId },
    /// A match settled; fills and value transfer derive from this record
    TradeSettled(Trade),
}

impl EngineEvent {
    /// Short tag for logs and journal entry headers
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::ReadingRecorded(_) => "ReadingRecorded",
            EngineEvent::MintStatusChanged { .. } => "MintStatusChanged",
            EngineEvent::BalanceDeposited { .. } => "BalanceDeposited",
            EngineEvent::OrderAccepted(_) => "OrderAccepted",
            EngineEvent::EscrowLocked { .. } => "EscrowLocked",
            EngineEvent::OrderCancelled { .. } => "OrderCancelled",
            EngineEvent::EscrowReleased { .. } => "EscrowReleased",
            EngineEvent::TradeSettled(_) => "TradeSettled",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
