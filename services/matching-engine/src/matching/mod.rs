//! Matching logic module
//!
//! Crossing detection and the settlement coordinator.

pub mod crossing;
pub mod settlement;

pub use settlement::SettlementCoordinator;
