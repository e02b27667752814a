//! Per-zone aggregate statistics
//!
//! One `ZoneStat` per zone, created lazily on first reading. Owned
//! exclusively by the zone aggregator; accumulators are monotonic.

use crate::ids::ZoneId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Snapshot of a zone's accumulated generation statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStat {
    pub zone_id: ZoneId,
    pub active_meter_count: u64,
    pub total_generated_kwh: Decimal,
    pub total_consumed_kwh: Decimal,
    pub last_updated: i64, // Unix nanos
}

impl ZoneStat {
    pub fn new(zone_id: ZoneId) -> Self {
        Self {
            zone_id,
            active_meter_count: 0,
            total_generated_kwh: Decimal::ZERO,
            total_consumed_kwh: Decimal::ZERO,
            last_updated: 0,
        }
    }
}
