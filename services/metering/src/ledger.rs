//! Meter reading ledger
//!
//! Append-only: readings are recorded once and never deleted; only the
//! minting path mutates them. Status transitions run under the reading's
//! exclusive map guard, which gives `mark_minting` its compare-and-swap
//! guarantee: at most one concurrent caller wins `Unminted -> Minting`.

use dashmap::DashMap;
use std::sync::Mutex;
use types::errors::ReadingError;
use types::ids::{MeterId, ReadingId, ZoneId};
use types::numeric::Quantity;
use types::reading::MeterReading;

/// In-memory reading ledger, rebuilt from the journal on restart
#[derive(Debug, Default)]
pub struct MeterReadingLedger {
    readings: DashMap<ReadingId, MeterReading>,
    /// Submission order for `list()`
    insertion_order: Mutex<Vec<ReadingId>>,
}

impl MeterReadingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new reading with status Unminted
    ///
    /// Fails with `InvalidReading` if `kwh <= 0`; always succeeds otherwise.
    pub fn record_reading(
        &self,
        meter_id: MeterId,
        zone_id: ZoneId,
        kwh: Quantity,
        submitted_at: i64,
    ) -> Result<MeterReading, ReadingError> {
        let reading = MeterReading::new(meter_id, zone_id, kwh, submitted_at)?;
        self.insert(reading.clone());
        Ok(reading)
    }

    /// Re-insert a reading recovered from the journal
    pub fn restore(&self, reading: MeterReading) {
        self.insert(reading);
    }

    fn insert(&self, reading: MeterReading) {
        let id = reading.reading_id;
        self.readings.insert(id, reading);
        self.insertion_order
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(id);
    }

    /// Attempt the single-flight `Unminted -> Minting` transition
    pub fn mark_minting(&self, reading_id: &ReadingId) -> Result<MeterReading, ReadingError> {
        let mut entry = self.get_mut(reading_id)?;
        entry.begin_mint()?;
        Ok(entry.clone())
    }

    /// `Minting -> Minted` with the confirmed transaction reference
    pub fn mark_minted(
        &self,
        reading_id: &ReadingId,
        tx_ref: &str,
    ) -> Result<MeterReading, ReadingError> {
        let mut entry = self.get_mut(reading_id)?;
        entry.complete_mint(tx_ref)?;
        Ok(entry.clone())
    }

    /// `Minting -> MintFailed` after an explicit gateway rejection
    pub fn mark_mint_failed(&self, reading_id: &ReadingId) -> Result<MeterReading, ReadingError> {
        let mut entry = self.get_mut(reading_id)?;
        entry.fail_mint()?;
        Ok(entry.clone())
    }

    /// `MintFailed -> Unminted` bounded retry transition
    pub fn reset_for_retry(
        &self,
        reading_id: &ReadingId,
        max_attempts: u32,
    ) -> Result<MeterReading, ReadingError> {
        let mut entry = self.get_mut(reading_id)?;
        entry.reset_for_retry(max_attempts)?;
        Ok(entry.clone())
    }

    /// Fetch a reading by id
    pub fn get(&self, reading_id: &ReadingId) -> Result<MeterReading, ReadingError> {
        self.readings
            .get(reading_id)
            .map(|r| r.clone())
            .ok_or_else(|| ReadingError::NotFound {
                reading_id: reading_id.to_string(),
            })
    }

    /// All readings in submission order
    pub fn list(&self) -> Vec<MeterReading> {
        let order = self
            .insertion_order
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        order
            .iter()
            .filter_map(|id| self.readings.get(id).map(|r| r.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    fn get_mut(
        &self,
        reading_id: &ReadingId,
    ) -> Result<dashmap::mapref::one::RefMut<'_, ReadingId, MeterReading>, ReadingError> {
        self.readings
            .get_mut(reading_id)
            .ok_or_else(|| ReadingError::NotFound {
                reading_id: reading_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use types::reading::MintStatus;

    fn record(ledger: &MeterReadingLedger, kwh: &str) -> MeterReading {
        ledger
            .record_reading(
                MeterId::new("MTR-001"),
                ZoneId::new(1),
                Quantity::from_str(kwh).unwrap(),
                1708123456789000000,
            )
            .unwrap()
    }

    #[test]
    fn test_record_and_get() {
        let ledger = MeterReadingLedger::new();
        let reading = record(&ledger, "10.5");

        let fetched = ledger.get(&reading.reading_id).unwrap();
        assert_eq!(fetched, reading);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_invalid_reading_rejected() {
        let ledger = MeterReadingLedger::new();
        let err = ledger
            .record_reading(
                MeterId::new("MTR-001"),
                ZoneId::new(1),
                Quantity::zero(),
                0,
            )
            .unwrap_err();
        assert!(matches!(err, ReadingError::InvalidReading(_)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_list_preserves_submission_order() {
        let ledger = MeterReadingLedger::new();
        let r1 = record(&ledger, "1");
        let r2 = record(&ledger, "2");
        let r3 = record(&ledger, "3");

        let ids: Vec<_> = ledger.list().iter().map(|r| r.reading_id).collect();
        assert_eq!(ids, vec![r1.reading_id, r2.reading_id, r3.reading_id]);
    }

    #[test]
    fn test_mint_transitions() {
        let ledger = MeterReadingLedger::new();
        let reading = record(&ledger, "10");

        ledger.mark_minting(&reading.reading_id).unwrap();
        let minted = ledger.mark_minted(&reading.reading_id, "tx-1").unwrap();
        assert_eq!(minted.mint_status, MintStatus::Minted);
        assert_eq!(minted.mint_tx_ref.as_deref(), Some("tx-1"));
    }

    #[test]
    fn test_mark_minting_single_flight_under_concurrency() {
        let ledger = Arc::new(MeterReadingLedger::new());
        let reading = record(&ledger, "10");
        let id = reading.reading_id;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.mark_minting(&id).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1, "exactly one caller may win the CAS");

        let after = ledger.get(&id).unwrap();
        assert_eq!(after.mint_status, MintStatus::Minting);
        assert_eq!(after.mint_attempts, 1);
    }

    #[test]
    fn test_unknown_reading() {
        let ledger = MeterReadingLedger::new();
        let err = ledger.mark_minting(&ReadingId::new()).unwrap_err();
        assert!(matches!(err, ReadingError::NotFound { .. }));
    }

    #[test]
    fn test_failed_then_retry() {
        let ledger = MeterReadingLedger::new();
        let reading = record(&ledger, "10");
        let id = reading.reading_id;

        ledger.mark_minting(&id).unwrap();
        ledger.mark_mint_failed(&id).unwrap();
        let reset = ledger.reset_for_retry(&id, 3).unwrap();
        assert_eq!(reset.mint_status, MintStatus::Unminted);
        // Second attempt can now proceed
        ledger.mark_minting(&id).unwrap();
    }
}
