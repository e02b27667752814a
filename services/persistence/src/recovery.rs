//! Crash recovery
//!
//! Folds a journaled event sequence back into the state the process held
//! when the last event was written: the readings ledger, per-owner
//! balances and escrows, orders with their fills applied, and the trade
//! log. The gateway seeds its services from the result before binding.
//!
//! The fold mirrors the live mutation order per zone. Events for one
//! owner can interleave across zones without a global order (a lock in
//! one zone may be journaled a few entries before the deposit or trade
//! proceeds that fund it), so available balances are folded with
//! tolerance for transient deficits and validated once the log ends.
//! Escrow entries themselves are zone-ordered, so consume and release
//! stay strict. Settlement effects are derived from `TradeSettled`
//! records rather than journaled as individual balance movements, so one
//! event replays one match.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};
use types::escrow::{AssetKind, EscrowEntry, OwnerAccount};
use types::ids::{OrderId, OwnerId};
use types::order::Order;
use types::reading::MeterReading;
use types::trade::Trade;

use crate::events::EngineEvent;
use crate::reader::{JournalReader, ReaderError};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Replay read failed: {0}")]
    Read(#[from] ReaderError),

    #[error("Replay inconsistency at sequence {sequence}: {detail}")]
    Inconsistent { sequence: u64, detail: String },
}

/// State rebuilt from the journal
#[derive(Debug, Default)]
pub struct RecoveredState {
    pub readings: Vec<MeterReading>,
    pub accounts: HashMap<OwnerId, OwnerAccount>,
    /// All orders ever accepted, with fills and cancellations applied
    pub orders: Vec<Order>,
    pub trades: Vec<Trade>,
    /// Next journal sequence to assign
    pub next_sequence: u64,
    /// Next trade settlement sequence
    pub next_trade_sequence: u64,
}

/// Replay-time account accumulator
///
/// Balances may dip negative mid-fold when a lock lands in the log ahead
/// of the credit funding it; `finish` enforces non-negativity once every
/// event has been applied.
#[derive(Debug, Default)]
struct AccountBuilder {
    available: HashMap<AssetKind, Decimal>,
    escrows: HashMap<OrderId, EscrowEntry>,
}

impl AccountBuilder {
    fn credit(&mut self, asset: AssetKind, amount: Decimal) {
        *self.available.entry(asset).or_insert(Decimal::ZERO) += amount;
    }

    fn lock(&mut self, order_id: OrderId, asset: AssetKind, amount: Decimal) {
        *self.available.entry(asset).or_insert(Decimal::ZERO) -= amount;
        self.escrows.insert(
            order_id,
            EscrowEntry {
                order_id,
                asset_kind: asset,
                locked_amount: amount,
            },
        );
    }

    fn release(&mut self, order_id: &OrderId) {
        if let Some(entry) = self.escrows.remove(order_id) {
            self.credit(entry.asset_kind, entry.locked_amount);
        }
    }

    fn consume(&mut self, order_id: &OrderId, amount: Decimal) -> Result<(), String> {
        let entry = self
            .escrows
            .get_mut(order_id)
            .ok_or_else(|| format!("consume of unknown escrow entry {order_id}"))?;
        if amount > entry.locked_amount {
            return Err(format!(
                "escrow overconsumption on {order_id}: {amount} exceeds {}",
                entry.locked_amount
            ));
        }
        entry.locked_amount -= amount;
        Ok(())
    }

    fn finish(self, owner_id: &OwnerId) -> Result<OwnerAccount, String> {
        for (asset, amount) in &self.available {
            if *amount < Decimal::ZERO {
                return Err(format!(
                    "owner {owner_id} ends replay with negative {asset} balance {amount}"
                ));
            }
        }
        Ok(OwnerAccount::from_parts(self.available, self.escrows))
    }
}

/// Replay every journal file under `dir`
pub fn replay(dir: &Path) -> Result<RecoveredState, RecoveryError> {
    let mut reader = JournalReader::open(dir)?;
    let entries = reader.read_all()?;

    let mut readings: HashMap<_, MeterReading> = HashMap::new();
    let mut reading_order = Vec::new();
    let mut accounts: HashMap<OwnerId, AccountBuilder> = HashMap::new();
    let mut orders: HashMap<OrderId, Order> = HashMap::new();
    let mut order_arrival = Vec::new();
    let mut order_owners: HashMap<OrderId, OwnerId> = HashMap::new();
    let mut trades = Vec::new();
    let mut next_trade_sequence = 1u64;

    for entry in &entries {
        let sequence = entry.sequence;
        let event = entry.event().map_err(ReaderError::from)?;
        match event {
            EngineEvent::ReadingRecorded(reading) => {
                reading_order.push(reading.reading_id);
                readings.insert(reading.reading_id, reading);
            }
            EngineEvent::MintStatusChanged {
                reading_id,
                status,
                mint_tx_ref,
                mint_attempts,
            } => {
                let reading =
                    readings
                        .get_mut(&reading_id)
                        .ok_or_else(|| RecoveryError::Inconsistent {
                            sequence,
                            detail: format!("mint status for unknown reading {reading_id}"),
                        })?;
                reading.mint_status = status;
                reading.mint_tx_ref = mint_tx_ref;
                reading.mint_attempts = mint_attempts;
            }
            EngineEvent::BalanceDeposited {
                owner_id,
                asset,
                amount,
            } => {
                accounts.entry(owner_id).or_default().credit(asset, amount);
            }
            EngineEvent::OrderAccepted(order) => {
                order_arrival.push(order.order_id);
                order_owners.insert(order.order_id, order.owner_id);
                orders.insert(order.order_id, order);
            }
            EngineEvent::EscrowLocked {
                owner_id,
                order_id,
                asset,
                amount,
            } => {
                accounts.entry(owner_id).or_default().lock(order_id, asset, amount);
            }
            EngineEvent::OrderCancelled { owner_id, order_id } => {
                match orders.get_mut(&order_id) {
                    Some(order) if !order.status.is_terminal() => order.cancel(),
                    Some(_) => {
                        return Err(RecoveryError::Inconsistent {
                            sequence,
                            detail: format!("cancel of terminal order {order_id}"),
                        })
                    }
                    None => {
                        return Err(RecoveryError::Inconsistent {
                            sequence,
                            detail: format!("cancel of unknown order {order_id}"),
                        })
                    }
                }
                // The matching EscrowReleased event follows; nothing to
                // release here.
                let _ = owner_id;
            }
            EngineEvent::EscrowReleased { owner_id, order_id } => {
                if let Some(account) = accounts.get_mut(&owner_id) {
                    account.release(&order_id);
                } else {
                    warn!(%owner_id, %order_id, "escrow release for unknown owner");
                }
            }
            EngineEvent::TradeSettled(trade) => {
                apply_trade(&trade, &mut orders, &mut accounts, sequence)?;
                next_trade_sequence = next_trade_sequence.max(trade.sequence + 1);
                trades.push(trade);
            }
        }
    }

    let last_sequence = entries.last().map(|e| e.sequence).unwrap_or(0);
    let accounts = accounts
        .into_iter()
        .map(|(owner_id, builder)| {
            builder
                .finish(&owner_id)
                .map(|account| (owner_id, account))
                .map_err(|detail| RecoveryError::Inconsistent {
                    sequence: last_sequence,
                    detail,
                })
        })
        .collect::<Result<HashMap<OwnerId, OwnerAccount>, _>>()?;

    let next_sequence = last_sequence + 1;
    info!(
        events = entries.len(),
        readings = readings.len(),
        orders = orders.len(),
        trades = trades.len(),
        "journal replay complete"
    );

    Ok(RecoveredState {
        readings: reading_order
            .iter()
            .filter_map(|id| readings.remove(id))
            .collect(),
        accounts,
        orders: order_arrival
            .iter()
            .filter_map(|id| orders.remove(id))
            .collect(),
        trades,
        next_sequence,
        next_trade_sequence,
    })
}

/// Re-apply one settled trade: fills on both orders, escrow consumption,
/// proceeds credits and any completion refund.
fn apply_trade(
    trade: &Trade,
    orders: &mut HashMap<OrderId, Order>,
    accounts: &mut HashMap<OwnerId, AccountBuilder>,
    sequence: u64,
) -> Result<(), RecoveryError> {
    let inconsistent = |detail: String| RecoveryError::Inconsistent { sequence, detail };

    let (buy_owner, buy_filled) = {
        let buy = orders
            .get_mut(&trade.buy_order_id)
            .ok_or_else(|| inconsistent(format!("trade names unknown buy {}", trade.buy_order_id)))?;
        buy.add_fill(trade.matched_amount);
        (buy.owner_id, buy.is_filled())
    };
    let (sell_owner, sell_filled) = {
        let sell = orders.get_mut(&trade.sell_order_id).ok_or_else(|| {
            inconsistent(format!("trade names unknown sell {}", trade.sell_order_id))
        })?;
        sell.add_fill(trade.matched_amount);
        (sell.owner_id, sell.is_filled())
    };

    let energy: Decimal = trade.matched_amount.as_decimal();
    let currency: Decimal = trade.trade_value();

    let seller = accounts.entry(sell_owner).or_default();
    seller
        .consume(&trade.sell_order_id, energy)
        .map_err(&inconsistent)?;
    seller.credit(AssetKind::CurrencyToken, currency);
    if sell_filled {
        seller.release(&trade.sell_order_id);
    }

    let buyer = accounts.entry(buy_owner).or_default();
    buyer
        .consume(&trade.buy_order_id, currency)
        .map_err(&inconsistent)?;
    buyer.credit(AssetKind::EnergyToken, energy);
    if buy_filled {
        // Refund any price improvement left in the completed order's escrow
        buyer.release(&trade.buy_order_id);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{JournalConfig, JournalWriter};
    use tempfile::TempDir;
    use types::ids::{MeterId, ZoneId};
    use types::numeric::{Price, Quantity};
    use types::order::{OrderStatus, Side};
    use types::reading::MintStatus;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn writer(dir: &Path) -> JournalWriter {
        JournalWriter::open(JournalConfig {
            sync_on_append: false,
            ..JournalConfig::new(dir)
        })
        .unwrap()
    }

    fn accepted_order(owner: OwnerId, side: Side, price: &str, amount: &str) -> Order {
        Order::new(
            owner,
            ZoneId::new(1),
            side,
            Price::from_str(price).unwrap(),
            Quantity::from_str(amount).unwrap(),
            types::now_nanos(),
        )
    }

    #[test]
    fn test_replay_empty_journal() {
        let tmp = TempDir::new().unwrap();
        let state = replay(tmp.path()).unwrap();
        assert!(state.readings.is_empty());
        assert!(state.orders.is_empty());
        assert_eq!(state.next_sequence, 1);
        assert_eq!(state.next_trade_sequence, 1);
    }

    #[test]
    fn test_replay_reading_and_mint() {
        let tmp = TempDir::new().unwrap();
        let mut w = writer(tmp.path());

        let reading = MeterReading::new(
            MeterId::new("MTR-7"),
            ZoneId::new(3),
            Quantity::from_str("12.5").unwrap(),
            types::now_nanos(),
        )
        .unwrap();
        let owner = OwnerId::new();

        w.append_event(&EngineEvent::ReadingRecorded(reading.clone()))
            .unwrap();
        w.append_event(&EngineEvent::MintStatusChanged {
            reading_id: reading.reading_id,
            status: MintStatus::Minted,
            mint_tx_ref: Some("tx-99".into()),
            mint_attempts: 1,
        })
        .unwrap();
        w.append_event(&EngineEvent::BalanceDeposited {
            owner_id: owner,
            asset: AssetKind::EnergyToken,
            amount: dec("12.5"),
        })
        .unwrap();
        w.sync().unwrap();

        let state = replay(tmp.path()).unwrap();
        assert_eq!(state.readings.len(), 1);
        assert_eq!(state.readings[0].mint_status, MintStatus::Minted);
        assert_eq!(state.readings[0].mint_tx_ref.as_deref(), Some("tx-99"));
        assert_eq!(
            state.accounts[&owner].available(AssetKind::EnergyToken),
            dec("12.5")
        );
        assert_eq!(state.next_sequence, 4);
    }

    #[test]
    fn test_replay_full_trading_session() {
        let tmp = TempDir::new().unwrap();
        let mut w = writer(tmp.path());

        let seller = OwnerId::new();
        let buyer = OwnerId::new();
        let sell = accepted_order(seller, Side::SELL, "2.0", "10");
        let buy = accepted_order(buyer, Side::BUY, "2.0", "10");

        w.append_event(&EngineEvent::BalanceDeposited {
            owner_id: seller,
            asset: AssetKind::EnergyToken,
            amount: dec("10"),
        })
        .unwrap();
        w.append_event(&EngineEvent::BalanceDeposited {
            owner_id: buyer,
            asset: AssetKind::CurrencyToken,
            amount: dec("25"),
        })
        .unwrap();

        w.append_event(&EngineEvent::OrderAccepted(sell.clone())).unwrap();
        w.append_event(&EngineEvent::EscrowLocked {
            owner_id: seller,
            order_id: sell.order_id,
            asset: AssetKind::EnergyToken,
            amount: dec("10"),
        })
        .unwrap();
        w.append_event(&EngineEvent::OrderAccepted(buy.clone())).unwrap();
        w.append_event(&EngineEvent::EscrowLocked {
            owner_id: buyer,
            order_id: buy.order_id,
            asset: AssetKind::CurrencyToken,
            amount: dec("20"),
        })
        .unwrap();

        let trade = Trade::new(
            1,
            buy.order_id,
            sell.order_id,
            ZoneId::new(1),
            Price::from_str("2.0").unwrap(),
            Quantity::from_str("10").unwrap(),
            types::now_nanos(),
        );
        w.append_event(&EngineEvent::TradeSettled(trade)).unwrap();
        w.sync().unwrap();

        let state = replay(tmp.path()).unwrap();

        assert_eq!(state.trades.len(), 1);
        assert_eq!(state.next_trade_sequence, 2);
        assert_eq!(state.orders.len(), 2);
        assert!(state.orders.iter().all(|o| o.status == OrderStatus::Filled));

        // Value ended where the live path would put it
        assert_eq!(
            state.accounts[&seller].available(AssetKind::CurrencyToken),
            dec("20")
        );
        assert_eq!(
            state.accounts[&buyer].available(AssetKind::EnergyToken),
            dec("10")
        );
        assert_eq!(
            state.accounts[&buyer].available(AssetKind::CurrencyToken),
            dec("5")
        );
    }

    #[test]
    fn test_replay_cancel_releases_escrow() {
        let tmp = TempDir::new().unwrap();
        let mut w = writer(tmp.path());

        let owner = OwnerId::new();
        let order = accepted_order(owner, Side::SELL, "2.0", "10");

        w.append_event(&EngineEvent::BalanceDeposited {
            owner_id: owner,
            asset: AssetKind::EnergyToken,
            amount: dec("10"),
        })
        .unwrap();
        w.append_event(&EngineEvent::OrderAccepted(order.clone())).unwrap();
        w.append_event(&EngineEvent::EscrowLocked {
            owner_id: owner,
            order_id: order.order_id,
            asset: AssetKind::EnergyToken,
            amount: dec("10"),
        })
        .unwrap();
        w.append_event(&EngineEvent::OrderCancelled {
            owner_id: owner,
            order_id: order.order_id,
        })
        .unwrap();
        w.append_event(&EngineEvent::EscrowReleased {
            owner_id: owner,
            order_id: order.order_id,
        })
        .unwrap();
        w.sync().unwrap();

        let state = replay(tmp.path()).unwrap();
        assert_eq!(state.orders[0].status, OrderStatus::Cancelled);
        assert_eq!(
            state.accounts[&owner].available(AssetKind::EnergyToken),
            dec("10")
        );
        assert!(state.accounts[&owner].escrow_entry(&order.order_id).is_none());
    }

    #[test]
    fn test_replay_tolerates_lock_journaled_before_deposit() {
        let tmp = TempDir::new().unwrap();
        let mut w = writer(tmp.path());

        // Concurrent handlers can journal a lock in one zone before the
        // deposit funding it lands in the log. The whole log still
        // balances, so replay must accept it.
        let owner = OwnerId::new();
        let order = accepted_order(owner, Side::SELL, "2.0", "10");

        w.append_event(&EngineEvent::OrderAccepted(order.clone())).unwrap();
        w.append_event(&EngineEvent::EscrowLocked {
            owner_id: owner,
            order_id: order.order_id,
            asset: AssetKind::EnergyToken,
            amount: dec("10"),
        })
        .unwrap();
        w.append_event(&EngineEvent::BalanceDeposited {
            owner_id: owner,
            asset: AssetKind::EnergyToken,
            amount: dec("12"),
        })
        .unwrap();
        w.sync().unwrap();

        let state = replay(tmp.path()).unwrap();
        let account = &state.accounts[&owner];
        assert_eq!(account.available(AssetKind::EnergyToken), dec("2"));
        assert_eq!(
            account.escrow_entry(&order.order_id).unwrap().locked_amount,
            dec("10")
        );
    }

    #[test]
    fn test_replay_rejects_lock_never_funded() {
        let tmp = TempDir::new().unwrap();
        let mut w = writer(tmp.path());

        let owner = OwnerId::new();
        let order = accepted_order(owner, Side::SELL, "2.0", "10");

        w.append_event(&EngineEvent::OrderAccepted(order.clone())).unwrap();
        w.append_event(&EngineEvent::EscrowLocked {
            owner_id: owner,
            order_id: order.order_id,
            asset: AssetKind::EnergyToken,
            amount: dec("10"),
        })
        .unwrap();
        w.sync().unwrap();

        // A deficit still open at the end of the log is real corruption
        assert!(matches!(
            replay(tmp.path()),
            Err(RecoveryError::Inconsistent { sequence: 2, .. })
        ));
    }

    #[test]
    fn test_replay_rejects_trade_for_unknown_order() {
        let tmp = TempDir::new().unwrap();
        let mut w = writer(tmp.path());

        let trade = Trade::new(
            1,
            OrderId::new(),
            OrderId::new(),
            ZoneId::new(1),
            Price::from_str("2.0").unwrap(),
            Quantity::from_str("1").unwrap(),
            types::now_nanos(),
        );
        w.append_event(&EngineEvent::TradeSettled(trade)).unwrap();
        w.sync().unwrap();

        assert!(matches!(
            replay(tmp.path()),
            Err(RecoveryError::Inconsistent { sequence: 1, .. })
        ));
    }
}
