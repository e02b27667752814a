//! Escrow entries and per-owner balances
//!
//! Every open order has exactly one escrow entry: energy tokens for sells,
//! currency tokens for buys. The entry is created atomically with the lock
//! that funds it, decremented only by settlement, and released in full when
//! the order reaches a terminal state.
//!
//! `OwnerAccount` holds one owner's available balances and escrow entries;
//! all its operations are single-owner atomic steps, serialized by the
//! escrow ledger's per-owner lock.

use crate::errors::EscrowError;
use crate::ids::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Asset class held in escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    /// Minted kWh-backed tokens (what sellers escrow)
    EnergyToken,
    /// Payment tokens (what buyers escrow)
    CurrencyToken,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::EnergyToken => write!(f, "EnergyToken"),
            AssetKind::CurrencyToken => write!(f, "CurrencyToken"),
        }
    }
}

/// Value locked against a single open order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowEntry {
    pub order_id: OrderId,
    pub asset_kind: AssetKind,
    pub locked_amount: Decimal,
}

/// One owner's balances: available funds per asset plus per-order escrows
///
/// Invariant: every amount is non-negative, and value only moves between
/// `available` and `escrows` through the operations below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerAccount {
    available: HashMap<AssetKind, Decimal>,
    escrows: HashMap<OrderId, EscrowEntry>,
}

impl OwnerAccount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an account from recovered balances and escrow entries
    ///
    /// Invariant: every amount is non-negative. Journal replay validates
    /// this before constructing the account.
    pub fn from_parts(
        available: HashMap<AssetKind, Decimal>,
        escrows: HashMap<OrderId, EscrowEntry>,
    ) -> Self {
        Self { available, escrows }
    }

    /// Available (unlocked) balance of an asset
    pub fn available(&self, asset: AssetKind) -> Decimal {
        self.available.get(&asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Remaining locked amount for an order, if an entry exists
    pub fn escrow_entry(&self, order_id: &OrderId) -> Option<&EscrowEntry> {
        self.escrows.get(order_id)
    }

    /// Credit available balance (deposit, mint proceeds, trade settlement)
    pub fn credit(&mut self, asset: AssetKind, amount: Decimal) {
        debug_assert!(amount >= Decimal::ZERO, "credit amount must be non-negative");
        *self.available.entry(asset).or_insert(Decimal::ZERO) += amount;
    }

    /// Move `amount` of available balance into a new escrow entry
    ///
    /// Atomic check-and-move: fails with `InsufficientBalance` without
    /// mutating anything if the available balance does not cover `amount`.
    pub fn lock(
        &mut self,
        order_id: OrderId,
        asset: AssetKind,
        amount: Decimal,
    ) -> Result<(), EscrowError> {
        let balance = self.available.entry(asset).or_insert(Decimal::ZERO);
        if *balance < amount {
            return Err(EscrowError::InsufficientBalance {
                asset: asset.to_string(),
                required: amount.to_string(),
                available: balance.to_string(),
            });
        }
        *balance -= amount;
        self.escrows.insert(
            order_id,
            EscrowEntry {
                order_id,
                asset_kind: asset,
                locked_amount: amount,
            },
        );
        Ok(())
    }

    /// Return any remaining locked amount to the available balance
    ///
    /// Idempotent: releasing an already-released entry is a no-op
    /// returning zero.
    pub fn release(&mut self, order_id: &OrderId) -> Decimal {
        match self.escrows.remove(order_id) {
            Some(entry) => {
                self.credit(entry.asset_kind, entry.locked_amount);
                entry.locked_amount
            }
            None => Decimal::ZERO,
        }
    }

    /// Decrement an escrow entry as part of settlement
    ///
    /// Fails (aborting the enclosing settlement) if `amount` exceeds the
    /// currently locked amount. The consumed value is credited to the
    /// counterparty by the settlement coordinator, not here.
    pub fn consume(&mut self, order_id: &OrderId, amount: Decimal) -> Result<(), EscrowError> {
        let entry = self
            .escrows
            .get_mut(order_id)
            .ok_or_else(|| EscrowError::EntryNotFound {
                order_id: order_id.to_string(),
            })?;
        if amount > entry.locked_amount {
            return Err(EscrowError::Overconsumption {
                order_id: order_id.to_string(),
                requested: amount.to_string(),
                locked: entry.locked_amount.to_string(),
            });
        }
        entry.locked_amount -= amount;
        Ok(())
    }

    /// Compensate a consume that is being rolled back
    ///
    /// Used only when a two-leg settlement aborts after its first consume
    /// succeeded; restores the locked amount exactly.
    pub fn unconsume(&mut self, order_id: &OrderId, amount: Decimal) -> Result<(), EscrowError> {
        let entry = self
            .escrows
            .get_mut(order_id)
            .ok_or_else(|| EscrowError::EntryNotFound {
                order_id: order_id.to_string(),
            })?;
        entry.locked_amount += amount;
        Ok(())
    }
}
