//! Error taxonomy for the energy trading core
//!
//! Per-module error enums using thiserror, rolled up into `CoreError`.
//! `ErrorKind` is the coarse classification the gateway maps onto HTTP
//! statuses: validation errors reject synchronously with nothing mutated,
//! conflicts report single-flight losers, resource errors reject before any
//! order or escrow entry exists, external errors are recorded on the
//! reading, and consistency faults are fatal for the affected zone.

use thiserror::Error;

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; rejected synchronously, no state mutated
    Validation,
    /// Concurrent single-flight violation; reported, not retried
    Conflict,
    /// Insufficient funds; rejected before any entity is created
    Resource,
    /// Requested entity does not exist
    NotFound,
    /// External collaborator failure (mint gateway)
    External,
    /// Accounting invariant already violated; fatal for the zone
    Consistency,
}

/// Top-level core error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Reading error: {0}")]
    Reading(#[from] ReadingError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Escrow error: {0}")]
    Escrow(#[from] EscrowError),

    #[error("Mint error: {0}")]
    Mint(#[from] MintError),

    #[error("Consistency fault: {0}")]
    Consistency(#[from] ConsistencyFault),
}

impl CoreError {
    /// Classify for propagation policy and HTTP mapping
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Reading(e) => e.kind(),
            CoreError::Order(e) => e.kind(),
            CoreError::Escrow(e) => e.kind(),
            CoreError::Mint(e) => e.kind(),
            CoreError::Consistency(_) => ErrorKind::Consistency,
        }
    }
}

/// Meter reading ledger errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadingError {
    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    #[error("Reading not found: {reading_id}")]
    NotFound { reading_id: String },

    #[error("Mint already in flight for reading {reading_id}")]
    AlreadyMinting { reading_id: String },

    #[error("Reading {reading_id} already minted")]
    AlreadyMinted { reading_id: String },

    #[error("Reading {reading_id} is not in Minting state")]
    NotMinting { reading_id: String },

    #[error("Mint retries exhausted for reading {reading_id}: {attempts} attempts")]
    RetryExhausted { reading_id: String, attempts: u32 },
}

impl ReadingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReadingError::InvalidReading(_) => ErrorKind::Validation,
            ReadingError::NotFound { .. } => ErrorKind::NotFound,
            ReadingError::AlreadyMinting { .. }
            | ReadingError::AlreadyMinted { .. }
            | ReadingError::NotMinting { .. }
            | ReadingError::RetryExhausted { .. } => ErrorKind::Conflict,
        }
    }
}

/// Order lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Order not found: {order_id}")]
    NotFound { order_id: String },

    #[error("Order {order_id} already in terminal state: {status}")]
    AlreadyTerminal { order_id: String, status: String },

    #[error("Order {order_id} does not belong to caller")]
    NotOwner { order_id: String },

    #[error("Matching halted for zone {zone_id} pending operator intervention")]
    ZoneHalted { zone_id: i32 },
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::InvalidPrice(_) | OrderError::InvalidAmount(_) => ErrorKind::Validation,
            OrderError::NotFound { .. } => ErrorKind::NotFound,
            OrderError::AlreadyTerminal { .. } | OrderError::NotOwner { .. } => ErrorKind::Conflict,
            OrderError::ZoneHalted { .. } => ErrorKind::Consistency,
        }
    }
}

/// Escrow ledger errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EscrowError {
    #[error("Insufficient balance for {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: String,
        available: String,
    },

    #[error("Overconsumption on order {order_id}: requested {requested}, locked {locked}")]
    Overconsumption {
        order_id: String,
        requested: String,
        locked: String,
    },

    #[error("No escrow entry for order {order_id}")]
    EntryNotFound { order_id: String },
}

impl EscrowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EscrowError::InsufficientBalance { .. } => ErrorKind::Resource,
            // A failing consume during settlement means the escrow was
            // mis-sized at order creation: an upstream accounting bug.
            EscrowError::Overconsumption { .. } | EscrowError::EntryNotFound { .. } => {
                ErrorKind::Consistency
            }
        }
    }
}

/// Token mint gateway errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MintError {
    #[error("Mint rejected by gateway: {0}")]
    Rejected(String),

    #[error("Mint call timed out; outcome unknown, reading left in Minting")]
    Timeout,
}

impl MintError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::External
    }
}

/// Fatal settlement accounting fault
///
/// Indicates the escrow invariant was already violated upstream. The zone is
/// halted and an operator must intervene; this is never surfaced as an
/// ordinary user-facing error.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("settlement aborted in zone {zone_id}: {reason}")]
pub struct ConsistencyFault {
    pub zone_id: i32,
    pub reason: String,
}
