//! Matching engine
//!
//! One `MatchingEngine` owns every zone book, the order store, the escrow
//! ledger and the trade log. Order submission escrows first, rests the
//! order, then runs the matching pass for that zone while still holding
//! the zone lock, so callers observe submit-and-match as one atomic step.
//!
//! A settlement consistency fault halts the affected zone: its resting
//! orders and escrows are frozen as-is for operator inspection and new
//! submissions are rejected with `ZoneHalted`. Other zones are unaffected.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::{debug, error, info, warn};
use types::errors::{ConsistencyFault, CoreError, OrderError};
use types::escrow::AssetKind;
use types::ids::{OrderId, OwnerId, ZoneId};
use types::now_nanos;
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderStatus, Side};
use types::trade::Trade;

use crate::book::ZoneBook;
use crate::escrow::EscrowLedger;
use crate::matching::crossing;
use crate::matching::settlement::SettlementCoordinator;

/// Outcome of an order submission
#[derive(Debug, Clone)]
pub struct SubmitResult {
    /// The accepted order, after any immediate matching
    pub order: Order,
    /// Trades settled by the submission's matching pass
    pub trades: Vec<Trade>,
}

/// The per-zone continuous double auction engine
#[derive(Debug)]
pub struct MatchingEngine {
    zones: DashMap<ZoneId, Arc<Mutex<ZoneBook>>>,
    orders: DashMap<OrderId, Order>,
    escrow: Arc<EscrowLedger>,
    settlement: SettlementCoordinator,
    trades: Mutex<Vec<Trade>>,
    halted_zones: Mutex<HashSet<ZoneId>>,
}

impl MatchingEngine {
    pub fn new(escrow: Arc<EscrowLedger>) -> Self {
        Self {
            zones: DashMap::new(),
            orders: DashMap::new(),
            settlement: SettlementCoordinator::new(Arc::clone(&escrow)),
            escrow,
            trades: Mutex::new(Vec::new()),
            halted_zones: Mutex::new(HashSet::new()),
        }
    }

    pub fn escrow(&self) -> &Arc<EscrowLedger> {
        &self.escrow
    }

    /// Submit a limit order: escrow, rest, then match
    ///
    /// The required escrow is locked before the order exists anywhere, so a
    /// rejected lock leaves no trace. The matching pass runs under the zone
    /// lock and settles greedily until the book no longer crosses.
    pub fn submit_order(
        &self,
        owner_id: OwnerId,
        zone_id: ZoneId,
        side: Side,
        price: Price,
        amount: Quantity,
    ) -> Result<SubmitResult, CoreError> {
        if self.is_halted(zone_id) {
            return Err(OrderError::ZoneHalted {
                zone_id: zone_id.as_i32(),
            }
            .into());
        }
        if amount.is_zero() {
            return Err(OrderError::InvalidAmount("amount must be positive".into()).into());
        }

        let order = Order::new(owner_id, zone_id, side, price, amount, now_nanos());

        // Clone the zone handle out of the map so its shard guard is not
        // held across the matching pass; only the zone mutex serializes it
        // and unrelated zones on the same shard stay reachable.
        let zone = Arc::clone(
            self.zones
                .entry(zone_id)
                .or_insert_with(|| Arc::new(Mutex::new(ZoneBook::new())))
                .value(),
        );
        let mut book = zone.lock().unwrap_or_else(|e| e.into_inner());

        // Lock the full notional up front; buyers escrow currency for the
        // whole amount at their own limit price, sellers escrow the energy.
        let (asset, escrow_amount) = match side {
            Side::BUY => (AssetKind::CurrencyToken, price.value_of(amount)),
            Side::SELL => (AssetKind::EnergyToken, amount.as_decimal()),
        };
        self.escrow
            .lock(owner_id, order.order_id, asset, escrow_amount)
            .map_err(|e| {
                debug!(owner_id = %owner_id, error = %e, "order rejected at escrow");
                e
            })?;

        self.orders.insert(order.order_id, order.clone());
        book.insert(&order);
        info!(
            order_id = %order.order_id,
            zone_id = zone_id.as_i32(),
            side = ?side,
            price = %price,
            amount = %amount,
            "order accepted"
        );

        let trades = self.run_matching_pass(zone_id, &mut book);

        let order = self
            .orders
            .get(&order.order_id)
            .map(|o| o.clone())
            .unwrap_or(order);

        Ok(SubmitResult { order, trades })
    }

    /// Cancel an open order and release its remaining escrow
    pub fn cancel_order(&self, owner_id: OwnerId, order_id: OrderId) -> Result<Order, OrderError> {
        // Resolve the zone without holding an order guard across the zone
        // lock acquisition.
        let (zone_id, order_owner) = self
            .orders
            .get(&order_id)
            .map(|o| (o.zone_id, o.owner_id))
            .ok_or_else(|| OrderError::NotFound {
                order_id: order_id.to_string(),
            })?;
        if order_owner != owner_id {
            return Err(OrderError::NotOwner {
                order_id: order_id.to_string(),
            });
        }

        let zone = self
            .zones
            .get(&zone_id)
            .map(|z| Arc::clone(z.value()))
            .ok_or_else(|| OrderError::NotFound {
                order_id: order_id.to_string(),
            })?;
        let mut book = zone.lock().unwrap_or_else(|e| e.into_inner());

        // Re-check under the zone lock; a concurrent matching pass may have
        // filled the order while we were acquiring it.
        let mut entry = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| OrderError::NotFound {
                order_id: order_id.to_string(),
            })?;
        if entry.status.is_terminal() {
            return Err(OrderError::AlreadyTerminal {
                order_id: order_id.to_string(),
                status: format!("{:?}", entry.status),
            });
        }

        book.remove(&order_id, entry.price_per_unit, entry.side);
        entry.cancel();
        let cancelled = entry.clone();
        drop(entry);

        let released = self.escrow.release(&owner_id, &order_id);
        info!(
            order_id = %order_id,
            zone_id = zone_id.as_i32(),
            released = %released,
            "order cancelled"
        );

        Ok(cancelled)
    }

    /// Drain every crossing at the top of the zone's book
    ///
    /// Runs under the zone lock. Stops when the book no longer crosses,
    /// when both tops belong to the same owner (self-trade prevention:
    /// neither order is cancelled, the pass just stops for this zone), or
    /// when settlement faults, which halts the zone.
    fn run_matching_pass(&self, zone_id: ZoneId, book: &mut ZoneBook) -> Vec<Trade> {
        let mut trades = Vec::new();

        while let Some((buy_top, sell_top)) = book.peek_matchable() {
            if buy_top.owner_id == sell_top.owner_id {
                debug!(
                    zone_id = zone_id.as_i32(),
                    owner_id = %buy_top.owner_id,
                    "self-trade at top of book; matching pass stopped"
                );
                break;
            }

            let price = crossing::execution_price(&buy_top, &sell_top);
            let matched = buy_top.remaining.min(sell_top.remaining);

            let buy = match self.orders.get(&buy_top.order_id) {
                Some(o) => o.clone(),
                None => break,
            };
            let sell = match self.orders.get(&sell_top.order_id) {
                Some(o) => o.clone(),
                None => break,
            };

            match self.settlement.settle(&buy, &sell, price, matched, now_nanos()) {
                Ok(trade) => {
                    // Record fills in separate guard scopes so no two order
                    // guards are held at once.
                    let buy_filled = match self.orders.get_mut(&buy_top.order_id) {
                        Some(mut o) => {
                            o.add_fill(matched);
                            o.is_filled()
                        }
                        None => false,
                    };
                    let sell_filled = match self.orders.get_mut(&sell_top.order_id) {
                        Some(mut o) => {
                            o.add_fill(matched);
                            o.is_filled()
                        }
                        None => false,
                    };
                    if sell_filled {
                        // Drops the fully consumed entry
                        self.escrow.release(&sell_top.owner_id, &sell_top.order_id);
                    }
                    // A buy that executed below its limit price has unspent
                    // escrow left; refund it the moment the order completes.
                    if buy_filled {
                        let refund = self.escrow.release(&buy_top.owner_id, &buy_top.order_id);
                        if !refund.is_zero() {
                            debug!(
                                order_id = %buy_top.order_id,
                                refund = %refund,
                                "price-improvement escrow refunded"
                            );
                        }
                    }
                    book.apply_match(matched);
                    self.trades
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(trade.clone());
                    trades.push(trade);
                }
                Err(fault) => {
                    self.halt_zone(zone_id, &fault);
                    break;
                }
            }
        }

        trades
    }

    fn halt_zone(&self, zone_id: ZoneId, fault: &ConsistencyFault) {
        error!(
            zone_id = zone_id.as_i32(),
            reason = %fault.reason,
            "settlement fault; halting zone"
        );
        self.halted_zones
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(zone_id);
    }

    pub fn is_halted(&self, zone_id: ZoneId) -> bool {
        self.halted_zones
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&zone_id)
    }

    /// Look up an order by id
    pub fn get_order(&self, order_id: &OrderId) -> Option<Order> {
        self.orders.get(order_id).map(|o| o.clone())
    }

    /// All orders belonging to an owner, newest first
    pub fn orders_for(&self, owner_id: &OwnerId) -> Vec<Order> {
        let mut out: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.owner_id == *owner_id)
            .map(|o| o.clone())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// All settled trades in sequence order
    pub fn trades(&self) -> Vec<Trade> {
        self.trades
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Settled trades for a zone, in sequence order
    pub fn trades_for(&self, zone_id: ZoneId) -> Vec<Trade> {
        self.trades
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|t| t.zone_id == zone_id)
            .cloned()
            .collect()
    }

    /// Re-insert a recovered order without escrowing or matching
    ///
    /// Journal replay restores escrow state through the escrow ledger's own
    /// restore path; here the order just goes back into its book slot. Open
    /// and partially filled orders rest again, terminal orders are stored
    /// for lookup only.
    pub fn restore_order(&self, order: Order) {
        if !order.status.is_terminal() && !order.remaining().is_zero() {
            let zone = Arc::clone(
                self.zones
                    .entry(order.zone_id)
                    .or_insert_with(|| Arc::new(Mutex::new(ZoneBook::new())))
                    .value(),
            );
            let mut book = zone.lock().unwrap_or_else(|e| e.into_inner());
            book.insert(&order);
        }
        self.orders.insert(order.order_id, order);
    }

    /// Restore a recovered trade and advance the settlement sequence
    pub fn restore_trade(&self, trade: Trade) {
        let mut trades = self.trades.lock().unwrap_or_else(|e| e.into_inner());
        self.settlement.set_sequence(trade.sequence + 1);
        trades.push(trade);
    }

    /// Run a matching pass for a zone after recovery
    ///
    /// Replay can leave a crossed book when the journal ends between an
    /// accept and its settlement; this drains it.
    pub fn rematch_zone(&self, zone_id: ZoneId) -> Vec<Trade> {
        if self.is_halted(zone_id) {
            warn!(zone_id = zone_id.as_i32(), "rematch skipped; zone halted");
            return Vec::new();
        }
        let zone = match self.zones.get(&zone_id) {
            Some(zone) => Arc::clone(zone.value()),
            None => return Vec::new(),
        };
        let mut book = zone.lock().unwrap_or_else(|e| e.into_inner());
        self.run_matching_pass(zone_id, &mut book)
    }
}
