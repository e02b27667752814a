//! Types library for the energy trading core
//!
//! This library provides all core type definitions shared across the
//! metering, matching, settlement and persistence services, ensuring
//! type safety and deterministic accounting behavior.
//!
//! # Modules
//! - `ids`: Unique identifiers (ReadingId, OrderId, TradeId, OwnerId, MeterId, ZoneId)
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `reading`: Meter reading ledger types and mint status lifecycle
//! - `order`: Order lifecycle types
//! - `trade`: Trade settlement record
//! - `escrow`: Escrow entries and per-owner balances
//! - `zone`: Per-zone aggregate statistics
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod reading;
pub mod order;
pub mod trade;
pub mod escrow;
pub mod zone;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Current time as Unix nanoseconds.
///
/// All timestamps in the core are i64 Unix nanos; wall clock is read in
/// exactly one place so tests can reason about it.
pub fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::reading::*;
    pub use crate::order::*;
    pub use crate::trade::*;
    pub use crate::escrow::*;
    pub use crate::zone::*;
    pub use crate::errors::*;
}
