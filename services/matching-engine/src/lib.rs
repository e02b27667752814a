//! Matching engine service
//!
//! Per-zone continuous double auction over limit orders with price-time
//! priority, escrowed settlement and exactly-once trade records.
//!
//! Concurrency model: each zone's book (insert, cancel, matching pass) is
//! serialized behind one mutex; each owner's balances are serialized
//! behind their own exclusive guard. Locks are always acquired zone-book
//! first, escrow second, so a settling pass and a concurrent cancel can
//! never deadlock.

pub mod book;
pub mod engine;
pub mod escrow;
pub mod matching;

pub use engine::{MatchingEngine, SubmitResult};
pub use escrow::EscrowLedger;
pub use matching::settlement::SettlementCoordinator;
