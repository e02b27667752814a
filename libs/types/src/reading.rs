//! Meter reading ledger types and mint status lifecycle
//!
//! Readings are append-only: kwh is immutable once recorded, and only the
//! minting path mutates a reading (status transitions plus the tx
//! reference). At most one mint attempt may be in flight per reading.

use crate::errors::ReadingError;
use crate::ids::{MeterId, ReadingId, ZoneId};
use crate::numeric::Quantity;
use serde::{Deserialize, Serialize};

/// Mint status of a recorded reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MintStatus {
    /// Recorded, no mint attempted
    Unminted,
    /// Exactly one mint attempt in flight (single-flight)
    Minting,
    /// Tokens issued (terminal)
    Minted,
    /// Last attempt explicitly failed; retryable under the bounded policy
    MintFailed,
}

/// An immutable metered generation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub reading_id: ReadingId,
    pub meter_id: MeterId,
    pub zone_id: ZoneId,
    pub kwh: Quantity,
    pub submitted_at: i64, // Unix nanos
    pub mint_status: MintStatus,
    pub mint_tx_ref: Option<String>,
    pub mint_attempts: u32,
}

impl MeterReading {
    /// Create a new unminted reading
    ///
    /// Fails with `InvalidReading` unless `kwh > 0`.
    pub fn new(
        meter_id: MeterId,
        zone_id: ZoneId,
        kwh: Quantity,
        submitted_at: i64,
    ) -> Result<Self, ReadingError> {
        if kwh.is_zero() {
            return Err(ReadingError::InvalidReading(
                "kwh must be strictly positive".into(),
            ));
        }
        Ok(Self {
            reading_id: ReadingId::new(),
            meter_id,
            zone_id,
            kwh,
            submitted_at,
            mint_status: MintStatus::Unminted,
            mint_tx_ref: None,
            mint_attempts: 0,
        })
    }

    /// Attempt the `Unminted -> Minting` transition
    ///
    /// The ledger serializes calls per reading, which gives this CAS
    /// semantics: exactly one concurrent caller observes `Unminted` and
    /// wins; the rest get a conflict error naming the state they lost to.
    pub fn begin_mint(&mut self) -> Result<(), ReadingError> {
        match self.mint_status {
            MintStatus::Unminted => {
                self.mint_status = MintStatus::Minting;
                self.mint_attempts += 1;
                Ok(())
            }
            MintStatus::Minting => Err(ReadingError::AlreadyMinting {
                reading_id: self.reading_id.to_string(),
            }),
            MintStatus::Minted => Err(ReadingError::AlreadyMinted {
                reading_id: self.reading_id.to_string(),
            }),
            MintStatus::MintFailed => Err(ReadingError::NotMinting {
                reading_id: self.reading_id.to_string(),
            }),
        }
    }

    /// `Minting -> Minted` with the confirmed transaction reference
    pub fn complete_mint(&mut self, tx_ref: impl Into<String>) -> Result<(), ReadingError> {
        if self.mint_status != MintStatus::Minting {
            return Err(ReadingError::NotMinting {
                reading_id: self.reading_id.to_string(),
            });
        }
        self.mint_status = MintStatus::Minted;
        self.mint_tx_ref = Some(tx_ref.into());
        Ok(())
    }

    /// `Minting -> MintFailed` after an explicit gateway rejection
    ///
    /// Timeouts never take this path; an ambiguous outcome leaves the
    /// reading in `Minting` for out-of-band reconciliation.
    pub fn fail_mint(&mut self) -> Result<(), ReadingError> {
        if self.mint_status != MintStatus::Minting {
            return Err(ReadingError::NotMinting {
                reading_id: self.reading_id.to_string(),
            });
        }
        self.mint_status = MintStatus::MintFailed;
        Ok(())
    }

    /// `MintFailed -> Unminted` retry transition, bounded by `max_attempts`
    pub fn reset_for_retry(&mut self, max_attempts: u32) -> Result<(), ReadingError> {
        if self.mint_status != MintStatus::MintFailed {
            return Err(ReadingError::NotMinting {
                reading_id: self.reading_id.to_string(),
            });
        }
        if self.mint_attempts >= max_attempts {
            return Err(ReadingError::RetryExhausted {
                reading_id: self.reading_id.to_string(),
                attempts: self.mint_attempts,
            });
        }
        self.mint_status = MintStatus::Unminted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(kwh: &str) -> Result<MeterReading, ReadingError> {
        MeterReading::new(
            MeterId::new("MTR-001"),
            ZoneId::new(1),
            Quantity::from_str(kwh).unwrap(),
            1708123456789000000,
        )
    }

    #[test]
    fn test_reading_creation() {
        let r = reading("10.5").unwrap();
        assert_eq!(r.mint_status, MintStatus::Unminted);
        assert_eq!(r.mint_attempts, 0);
        assert!(r.mint_tx_ref.is_none());
    }

    #[test]
    fn test_zero_kwh_rejected() {
        assert!(matches!(
            reading("0"),
            Err(ReadingError::InvalidReading(_))
        ));
    }

    #[test]
    fn test_mint_lifecycle() {
        let mut r = reading("10").unwrap();
        r.begin_mint().unwrap();
        assert_eq!(r.mint_status, MintStatus::Minting);
        assert_eq!(r.mint_attempts, 1);

        r.complete_mint("tx-abc").unwrap();
        assert_eq!(r.mint_status, MintStatus::Minted);
        assert_eq!(r.mint_tx_ref.as_deref(), Some("tx-abc"));
    }

    #[test]
    fn test_begin_mint_single_flight() {
        let mut r = reading("10").unwrap();
        r.begin_mint().unwrap();
        assert!(matches!(
            r.begin_mint(),
            Err(ReadingError::AlreadyMinting { .. })
        ));
    }

    #[test]
    fn test_begin_mint_after_minted_rejected() {
        let mut r = reading("10").unwrap();
        r.begin_mint().unwrap();
        r.complete_mint("tx").unwrap();
        assert!(matches!(
            r.begin_mint(),
            Err(ReadingError::AlreadyMinted { .. })
        ));
    }

    #[test]
    fn test_fail_and_retry() {
        let mut r = reading("10").unwrap();
        r.begin_mint().unwrap();
        r.fail_mint().unwrap();
        assert_eq!(r.mint_status, MintStatus::MintFailed);

        r.reset_for_retry(3).unwrap();
        assert_eq!(r.mint_status, MintStatus::Unminted);
        r.begin_mint().unwrap();
        assert_eq!(r.mint_attempts, 2);
    }

    #[test]
    fn test_retry_bounded() {
        let mut r = reading("10").unwrap();
        for _ in 0..3 {
            r.begin_mint().unwrap();
            r.fail_mint().unwrap();
            let _ = r.reset_for_retry(3);
        }
        assert!(matches!(
            r.reset_for_retry(3),
            Err(ReadingError::RetryExhausted { attempts: 3, .. })
        ));
    }

    #[test]
    fn test_complete_requires_minting() {
        let mut r = reading("10").unwrap();
        assert!(matches!(
            r.complete_mint("tx"),
            Err(ReadingError::NotMinting { .. })
        ));
    }
}
