//! Metering service
//!
//! Owns the append-only meter reading ledger, the token mint gateway
//! adapter (the idempotency boundary around the external mint call) and
//! the per-zone aggregation of the reading stream.

pub mod aggregator;
pub mod config;
pub mod gateway;
pub mod ledger;

pub use aggregator::ZoneAggregator;
pub use config::MintConfig;
pub use gateway::{
    MintGateway, MintOutcome, MintReceipt, MintService, MockMintGateway, MockMode, Reconciliation,
};
pub use ledger::MeterReadingLedger;
