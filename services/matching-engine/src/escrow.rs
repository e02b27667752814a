//! Escrow ledger
//!
//! Per-owner balance store behind exclusive per-owner guards. Every
//! operation is a single-owner atomic step, so two concurrent orders from
//! the same owner cannot double-spend, and lock/consume/release for one
//! owner never interleave.

use dashmap::DashMap;
use rust_decimal::Decimal;
use types::errors::EscrowError;
use types::escrow::{AssetKind, OwnerAccount};
use types::ids::{OrderId, OwnerId};

/// Concurrent escrow ledger keyed by owner
#[derive(Debug, Default)]
pub struct EscrowLedger {
    accounts: DashMap<OwnerId, OwnerAccount>,
}

impl EscrowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an owner's available balance (deposits, mint proceeds,
    /// settlement proceeds)
    pub fn credit(&self, owner: OwnerId, asset: AssetKind, amount: Decimal) {
        self.accounts
            .entry(owner)
            .or_default()
            .credit(asset, amount);
    }

    /// Available (unlocked) balance of an asset
    pub fn available(&self, owner: &OwnerId, asset: AssetKind) -> Decimal {
        self.accounts
            .get(owner)
            .map(|a| a.available(asset))
            .unwrap_or(Decimal::ZERO)
    }

    /// Remaining locked amount for an order, if any
    pub fn locked_for(&self, owner: &OwnerId, order_id: &OrderId) -> Option<Decimal> {
        self.accounts
            .get(owner)
            .and_then(|a| a.escrow_entry(order_id).map(|e| e.locked_amount))
    }

    /// Atomically move `amount` of available balance into escrow for an order
    pub fn lock(
        &self,
        owner: OwnerId,
        order_id: OrderId,
        asset: AssetKind,
        amount: Decimal,
    ) -> Result<(), EscrowError> {
        self.accounts
            .entry(owner)
            .or_default()
            .lock(order_id, asset, amount)
    }

    /// Return remaining locked value to the owner; idempotent
    pub fn release(&self, owner: &OwnerId, order_id: &OrderId) -> Decimal {
        self.accounts
            .get_mut(owner)
            .map(|mut a| a.release(order_id))
            .unwrap_or(Decimal::ZERO)
    }

    /// Decrement an order's escrow as part of settlement
    pub fn consume(
        &self,
        owner: &OwnerId,
        order_id: &OrderId,
        amount: Decimal,
    ) -> Result<(), EscrowError> {
        self.accounts
            .get_mut(owner)
            .ok_or_else(|| EscrowError::EntryNotFound {
                order_id: order_id.to_string(),
            })?
            .consume(order_id, amount)
    }

    /// Seed a recovered account wholesale (journal replay only)
    pub fn restore_account(&self, owner: OwnerId, account: OwnerAccount) {
        self.accounts.insert(owner, account);
    }

    /// Restore a consume that is being rolled back by an aborting settlement
    pub fn unconsume(
        &self,
        owner: &OwnerId,
        order_id: &OrderId,
        amount: Decimal,
    ) -> Result<(), EscrowError> {
        self.accounts
            .get_mut(owner)
            .ok_or_else(|| EscrowError::EntryNotFound {
                order_id: order_id.to_string(),
            })?
            .unconsume(order_id, amount)
    }
}
