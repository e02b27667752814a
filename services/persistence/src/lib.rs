//! Persistence service
//!
//! Append-only binary event journal with per-entry CRC32C checksums,
//! a tolerant sequential reader, and journal replay that rebuilds the
//! full trading state after a restart.
//!
//! Durability contract: trading events are journaled in the same
//! per-zone critical section as the mutation they record, balance
//! credits are journaled before they are applied, entries carry gapless
//! monotonic sequence numbers, and a truncated tail on read marks the
//! clean end of the log rather than an error.

pub mod events;
pub mod journal;
pub mod reader;
pub mod recovery;

pub use events::EngineEvent;
pub use journal::{EventLog, JournalConfig, JournalEntry, JournalError, JournalWriter};
pub use reader::{JournalReader, ReaderError};
pub use recovery::{replay, RecoveredState, RecoveryError};
