//! Shared application state
//!
//! One `Arc` handle per service. `initialize` replays the event journal
//! and seeds every service from the recovered state before the listener
//! binds, so the first request already sees the pre-crash world.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use matching_engine::{EscrowLedger, MatchingEngine};
use metering::{MeterReadingLedger, MintService, MockMintGateway, ZoneAggregator};
use persistence::{replay, EngineEvent, EventLog, JournalConfig};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use types::ids::ZoneId;

use crate::config::GatewayConfig;
use crate::mint_http::HttpMintGateway;

#[derive(Clone)]
pub struct AppState {
    pub readings: Arc<MeterReadingLedger>,
    pub aggregator: Arc<ZoneAggregator>,
    pub mint: Arc<MintService>,
    pub engine: Arc<MatchingEngine>,
    pub log: Arc<EventLog>,
    order_gates: Arc<DashMap<ZoneId, Arc<Mutex<()>>>>,
}

impl AppState {
    /// Build all services, replay the journal and rehydrate
    pub fn initialize(config: &GatewayConfig) -> Result<Self, anyhow::Error> {
        let readings = Arc::new(MeterReadingLedger::new());
        let aggregator = Arc::new(ZoneAggregator::new());
        let escrow = Arc::new(EscrowLedger::new());
        let engine = Arc::new(MatchingEngine::new(Arc::clone(&escrow)));

        let gateway: Arc<dyn metering::MintGateway> = match &config.mint_gateway_url {
            Some(url) => Arc::new(HttpMintGateway::new(url.clone())),
            None => {
                warn!("MINT_GATEWAY_URL unset; using in-process mock mint gateway");
                Arc::new(MockMintGateway::succeeding())
            }
        };
        let mint = Arc::new(MintService::new(
            Arc::clone(&readings),
            gateway,
            config.mint.clone(),
        ));

        let recovered = replay(&config.journal_dir)?;

        for reading in recovered.readings {
            aggregator.observe(&reading);
            readings.restore(reading);
        }
        for (owner, account) in recovered.accounts {
            escrow.restore_account(owner, account);
        }
        let open_zones: BTreeSet<_> = recovered
            .orders
            .iter()
            .filter(|o| !o.status.is_terminal())
            .map(|o| o.zone_id)
            .collect();
        for order in recovered.orders {
            engine.restore_order(order);
        }
        for trade in recovered.trades {
            engine.restore_trade(trade);
        }

        let log = Arc::new(EventLog::open(JournalConfig::new(&config.journal_dir))?);
        log.set_next_sequence(recovered.next_sequence);

        // A crash between an accept and its settlement can leave a crossed
        // book; drain it now and journal the resulting trades.
        for zone_id in open_zones {
            for trade in engine.rematch_zone(zone_id) {
                log.append(&EngineEvent::TradeSettled(trade))?;
            }
        }

        info!(
            readings = readings.len(),
            next_sequence = recovered.next_sequence,
            "state rehydrated from journal"
        );

        Ok(Self {
            readings,
            aggregator,
            mint,
            engine,
            log,
            order_gates: Arc::new(DashMap::new()),
        })
    }

    /// Serialize order mutation and journaling for one zone
    ///
    /// The guard is held from the engine call through the journal appends
    /// it produces, so the journal records a zone's trading events in
    /// causal order. Balance credits from other zones may still
    /// interleave; replay tolerates those.
    pub async fn zone_gate(&self, zone_id: ZoneId) -> OwnedMutexGuard<()> {
        let gate = Arc::clone(self.order_gates.entry(zone_id).or_default().value());
        gate.lock_owned().await
    }
}
