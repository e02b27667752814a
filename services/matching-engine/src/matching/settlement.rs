//! Settlement coordinator
//!
//! Executes one match event as an all-or-nothing value exchange against
//! the escrow ledger:
//!
//!   1. consume the seller's escrowed energy tokens (matched amount)
//!   2. consume the buyer's escrowed currency tokens (amount x price);
//!      on failure the seller consume is compensated with an unconsume
//!   3. credit the seller's currency and the buyer's energy balances
//!   4. emit a sequenced, immutable `Trade`
//!
//! A consume that fails here means the escrow was mis-sized at order
//! creation, which is an accounting invariant violation, not a user
//! error. Such failures surface as `ConsistencyFault` and the caller
//! halts the zone. Both orders stay in their pre-settlement state: no
//! fill is recorded and no balance moves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info};
use types::errors::ConsistencyFault;
use types::escrow::AssetKind;
use types::numeric::{Price, Quantity};
use types::order::Order;
use types::trade::Trade;

use crate::escrow::EscrowLedger;

/// Coordinates escrow movement and trade emission for matched orders
#[derive(Debug)]
pub struct SettlementCoordinator {
    escrow: Arc<EscrowLedger>,
    sequence: AtomicU64,
}

impl SettlementCoordinator {
    pub fn new(escrow: Arc<EscrowLedger>) -> Self {
        Self {
            escrow,
            sequence: AtomicU64::new(1),
        }
    }

    /// Set the next sequence number (recovery only)
    pub fn set_sequence(&self, next: u64) {
        self.sequence.store(next, Ordering::SeqCst);
    }

    /// Settle one match between a buy and a sell order
    ///
    /// Callers hold the zone lock, so order state cannot change under us.
    pub fn settle(
        &self,
        buy: &Order,
        sell: &Order,
        price: Price,
        amount: Quantity,
        settled_at: i64,
    ) -> Result<Trade, ConsistencyFault> {
        let energy: Decimal = amount.as_decimal();
        let currency: Decimal = price.value_of(amount);
        let zone_id = buy.zone_id;

        self.escrow
            .consume(&sell.owner_id, &sell.order_id, energy)
            .map_err(|e| ConsistencyFault {
                zone_id: zone_id.as_i32(),
                reason: format!("seller escrow consume failed: {e}"),
            })?;

        if let Err(e) = self
            .escrow
            .consume(&buy.owner_id, &buy.order_id, currency)
        {
            // Roll the seller side back before reporting the fault
            if let Err(undo) = self
                .escrow
                .unconsume(&sell.owner_id, &sell.order_id, energy)
            {
                error!(
                    zone_id = zone_id.as_i32(),
                    sell_order_id = %sell.order_id,
                    error = %undo,
                    "compensation failed; seller escrow left short"
                );
            }
            return Err(ConsistencyFault {
                zone_id: zone_id.as_i32(),
                reason: format!("buyer escrow consume failed: {e}"),
            });
        }

        // Both consumes succeeded; credits cannot fail
        self.escrow
            .credit(sell.owner_id, AssetKind::CurrencyToken, currency);
        self.escrow.credit(buy.owner_id, AssetKind::EnergyToken, energy);

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let trade = Trade::new(
            sequence,
            buy.order_id,
            sell.order_id,
            zone_id,
            price,
            amount,
            settled_at,
        );

        info!(
            trade_id = %trade.trade_id,
            sequence,
            zone_id = zone_id.as_i32(),
            buy_order_id = %buy.order_id,
            sell_order_id = %sell.order_id,
            price = %price.as_decimal(),
            amount = %energy,
            "trade settled"
        );

        Ok(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{OrderId, OwnerId, ZoneId};
    use types::order::Side;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn escrowed_order(
        ledger: &EscrowLedger,
        side: Side,
        price: &str,
        amount: &str,
        created_at: i64,
    ) -> Order {
        let order = Order::new(
            OwnerId::new(),
            ZoneId::new(1),
            side,
            Price::from_str(price).unwrap(),
            Quantity::from_str(amount).unwrap(),
            created_at,
        );
        let (asset, escrow_amount) = match side {
            Side::BUY => (
                AssetKind::CurrencyToken,
                order.price_per_unit.value_of(order.total_amount),
            ),
            Side::SELL => (AssetKind::EnergyToken, order.total_amount.as_decimal()),
        };
        ledger.credit(order.owner_id, asset, escrow_amount);
        ledger
            .lock(order.owner_id, order.order_id, asset, escrow_amount)
            .unwrap();
        order
    }

    #[test]
    fn test_settle_moves_value_both_ways() {
        let ledger = Arc::new(EscrowLedger::new());
        let coordinator = SettlementCoordinator::new(Arc::clone(&ledger));

        let buy = escrowed_order(&ledger, Side::BUY, "2.0", "10", 1);
        let sell = escrowed_order(&ledger, Side::SELL, "2.0", "10", 2);

        let trade = coordinator
            .settle(
                &buy,
                &sell,
                Price::from_str("2.0").unwrap(),
                Quantity::from_str("10").unwrap(),
                3,
            )
            .unwrap();

        assert_eq!(trade.sequence, 1);
        assert_eq!(trade.trade_value(), dec("20"));

        // Seller received 20 currency, buyer received 10 energy
        assert_eq!(
            ledger.available(&sell.owner_id, AssetKind::CurrencyToken),
            dec("20")
        );
        assert_eq!(
            ledger.available(&buy.owner_id, AssetKind::EnergyToken),
            dec("10")
        );

        // Both escrows fully consumed
        assert_eq!(
            ledger.locked_for(&sell.owner_id, &sell.order_id),
            Some(Decimal::ZERO)
        );
        assert_eq!(
            ledger.locked_for(&buy.owner_id, &buy.order_id),
            Some(Decimal::ZERO)
        );
    }

    #[test]
    fn test_settle_partial_leaves_escrow_remainder() {
        let ledger = Arc::new(EscrowLedger::new());
        let coordinator = SettlementCoordinator::new(Arc::clone(&ledger));

        let buy = escrowed_order(&ledger, Side::BUY, "3.0", "10", 1);
        let sell = escrowed_order(&ledger, Side::SELL, "3.0", "4", 2);

        coordinator
            .settle(
                &buy,
                &sell,
                Price::from_str("3.0").unwrap(),
                Quantity::from_str("4").unwrap(),
                3,
            )
            .unwrap();

        // Buyer escrowed 30, consumed 12, remainder stays locked
        assert_eq!(
            ledger.locked_for(&buy.owner_id, &buy.order_id),
            Some(dec("18"))
        );
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let ledger = Arc::new(EscrowLedger::new());
        let coordinator = SettlementCoordinator::new(Arc::clone(&ledger));

        let buy = escrowed_order(&ledger, Side::BUY, "2.0", "10", 1);
        let sell_a = escrowed_order(&ledger, Side::SELL, "2.0", "4", 2);
        let sell_b = escrowed_order(&ledger, Side::SELL, "2.0", "6", 3);

        let price = Price::from_str("2.0").unwrap();
        let t1 = coordinator
            .settle(&buy, &sell_a, price, Quantity::from_str("4").unwrap(), 4)
            .unwrap();
        let t2 = coordinator
            .settle(&buy, &sell_b, price, Quantity::from_str("6").unwrap(), 5)
            .unwrap();

        assert_eq!(t1.sequence, 1);
        assert_eq!(t2.sequence, 2);
    }

    #[test]
    fn test_buyer_consume_failure_compensates_seller() {
        let ledger = Arc::new(EscrowLedger::new());
        let coordinator = SettlementCoordinator::new(Arc::clone(&ledger));

        let sell = escrowed_order(&ledger, Side::SELL, "2.0", "10", 1);

        // Buyer escrow is deliberately short: locked 5 against a 20 need
        let buy = Order::new(
            OwnerId::new(),
            ZoneId::new(1),
            Side::BUY,
            Price::from_str("2.0").unwrap(),
            Quantity::from_str("10").unwrap(),
            2,
        );
        ledger.credit(buy.owner_id, AssetKind::CurrencyToken, dec("5"));
        ledger
            .lock(buy.owner_id, buy.order_id, AssetKind::CurrencyToken, dec("5"))
            .unwrap();

        let err = coordinator
            .settle(
                &buy,
                &sell,
                Price::from_str("2.0").unwrap(),
                Quantity::from_str("10").unwrap(),
                3,
            )
            .unwrap_err();
        assert_eq!(err.zone_id, 1);

        // Seller escrow was restored by the compensating unconsume
        assert_eq!(
            ledger.locked_for(&sell.owner_id, &sell.order_id),
            Some(dec("10"))
        );
        // Buyer escrow untouched
        assert_eq!(
            ledger.locked_for(&buy.owner_id, &buy.order_id),
            Some(dec("5"))
        );
        // No proceeds credited to either side
        assert_eq!(
            ledger.available(&sell.owner_id, AssetKind::CurrencyToken),
            Decimal::ZERO
        );
        assert_eq!(
            ledger.available(&buy.owner_id, AssetKind::EnergyToken),
            Decimal::ZERO
        );
    }
}
