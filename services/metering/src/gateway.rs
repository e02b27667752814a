//! Token minting gateway adapter
//!
//! Thin contract wrapping the external mint call. The ledger's
//! single-flight transition guarantees the core never issues two mint
//! calls for one reading; this adapter handles the other half of the
//! idempotency problem: an ambiguous outcome (timeout) leaves the reading
//! in `Minting` for out-of-band reconciliation instead of retrying
//! blindly, which would risk double issuance.

use crate::config::MintConfig;
use crate::ledger::MeterReadingLedger;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};
use types::errors::{CoreError, MintError, ReadingError};
use types::ids::ReadingId;
use types::reading::MeterReading;

/// Receipt returned by a confirmed external mint
#[derive(Debug, Clone, PartialEq)]
pub struct MintReceipt {
    pub tx_ref: String,
}

/// Contract the core requires from the external token program
#[async_trait]
pub trait MintGateway: Send + Sync {
    /// Mint `token_amount` tokens to `owner_wallet`
    async fn mint(&self, owner_wallet: &str, token_amount: Decimal)
        -> Result<MintReceipt, MintError>;
}

/// Result of a completed mint flow
#[derive(Debug, Clone, PartialEq)]
pub struct MintOutcome {
    pub reading: MeterReading,
    pub tx_ref: String,
    /// Tokens issued; the caller credits these to the owner's available
    /// energy balance (tokens are fungible, not tied back to the reading)
    pub token_amount: Decimal,
}

/// Operator-supplied resolution for a reading stuck in `Minting`
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// External query confirmed the mint executed
    Minted { tx_ref: String },
    /// External query confirmed the mint never executed
    NotExecuted,
}

/// Drives the reading mint lifecycle around the gateway call
pub struct MintService {
    ledger: Arc<MeterReadingLedger>,
    gateway: Arc<dyn MintGateway>,
    config: MintConfig,
}

impl MintService {
    pub fn new(
        ledger: Arc<MeterReadingLedger>,
        gateway: Arc<dyn MintGateway>,
        config: MintConfig,
    ) -> Self {
        Self {
            ledger,
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &MintConfig {
        &self.config
    }

    /// Mint tokens for a recorded reading
    ///
    /// Wins the single-flight transition, issues the gateway call under a
    /// bounded timeout and applies the outcome:
    /// - confirmed success: reading marked Minted, receipt returned
    /// - explicit rejection: reading marked MintFailed (retryable)
    /// - timeout: reading LEFT IN Minting; resolved via `reconcile`
    pub async fn mint_reading(
        &self,
        reading_id: &ReadingId,
        owner_wallet: &str,
    ) -> Result<MintOutcome, CoreError> {
        let reading = self.ledger.get(reading_id)?;

        if reading.kwh.as_decimal() > self.config.max_reading_kwh {
            return Err(ReadingError::InvalidReading(format!(
                "reading of {} kWh exceeds mint limit of {} kWh",
                reading.kwh, self.config.max_reading_kwh
            ))
            .into());
        }

        // Single-flight guard: losers error out here, nothing mutated for them
        self.ledger.mark_minting(reading_id)?;

        let token_amount = self.config.kwh_to_tokens(reading.kwh.as_decimal());
        let call = self.gateway.mint(owner_wallet, token_amount);

        match timeout(Duration::from_secs(self.config.mint_timeout_secs), call).await {
            Ok(Ok(receipt)) => {
                let reading = self.ledger.mark_minted(reading_id, &receipt.tx_ref)?;
                info!(
                    reading_id = %reading_id,
                    tx_ref = %receipt.tx_ref,
                    tokens = %token_amount,
                    "mint confirmed"
                );
                Ok(MintOutcome {
                    reading,
                    tx_ref: receipt.tx_ref,
                    token_amount,
                })
            }
            Ok(Err(MintError::Rejected(reason))) => {
                self.ledger.mark_mint_failed(reading_id)?;
                warn!(reading_id = %reading_id, %reason, "mint rejected by gateway");
                Err(MintError::Rejected(reason).into())
            }
            // The gateway reporting its own timeout is as ambiguous as ours
            Ok(Err(MintError::Timeout)) | Err(_) => {
                warn!(
                    reading_id = %reading_id,
                    "mint call timed out; leaving reading in Minting for reconciliation"
                );
                Err(MintError::Timeout.into())
            }
        }
    }

    /// Retry a previously failed mint, bounded by the configured attempt cap
    pub async fn retry_mint(
        &self,
        reading_id: &ReadingId,
        owner_wallet: &str,
    ) -> Result<MintOutcome, CoreError> {
        self.ledger
            .reset_for_retry(reading_id, self.config.max_mint_attempts)?;
        self.mint_reading(reading_id, owner_wallet).await
    }

    /// Operator path: resolve a reading stuck in `Minting` after querying
    /// the external system independently
    pub fn reconcile(
        &self,
        reading_id: &ReadingId,
        resolution: Reconciliation,
    ) -> Result<MeterReading, CoreError> {
        match resolution {
            Reconciliation::Minted { tx_ref } => {
                let reading = self.ledger.mark_minted(reading_id, &tx_ref)?;
                info!(reading_id = %reading_id, %tx_ref, "reconciled as minted");
                Ok(reading)
            }
            Reconciliation::NotExecuted => {
                let reading = self.ledger.mark_mint_failed(reading_id)?;
                info!(reading_id = %reading_id, "reconciled as not executed");
                Ok(reading)
            }
        }
    }
}

/// Mock gateway used in tests and when no real token program is wired
pub struct MockMintGateway {
    mode: MockMode,
    calls: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockMode {
    /// Every call succeeds with a synthetic tx reference
    Succeed,
    /// Every call is rejected
    Reject,
    /// Every call reports an ambiguous timeout
    TimeOut,
}

impl MockMintGateway {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            calls: AtomicU32::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(MockMode::Succeed)
    }

    /// Number of mint calls issued against this mock
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MintGateway for MockMintGateway {
    async fn mint(
        &self,
        owner_wallet: &str,
        _token_amount: Decimal,
    ) -> Result<MintReceipt, MintError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            MockMode::Succeed => Ok(MintReceipt {
                tx_ref: format!("mock-tx-{}-{}", owner_wallet, n),
            }),
            MockMode::Reject => Err(MintError::Rejected("mock rejection".into())),
            MockMode::TimeOut => Err(MintError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{MeterId, ZoneId};
    use types::numeric::Quantity;
    use types::reading::MintStatus;

    fn service(mode: MockMode) -> (MintService, Arc<MeterReadingLedger>, Arc<MockMintGateway>) {
        let ledger = Arc::new(MeterReadingLedger::new());
        let gateway = Arc::new(MockMintGateway::new(mode));
        let svc = MintService::new(
            Arc::clone(&ledger),
            Arc::clone(&gateway) as Arc<dyn MintGateway>,
            MintConfig::default(),
        );
        (svc, ledger, gateway)
    }

    fn record(ledger: &MeterReadingLedger, kwh: &str) -> ReadingId {
        ledger
            .record_reading(
                MeterId::new("MTR-001"),
                ZoneId::new(1),
                Quantity::from_str(kwh).unwrap(),
                1708123456789000000,
            )
            .unwrap()
            .reading_id
    }

    #[tokio::test]
    async fn test_successful_mint() {
        let (svc, ledger, gateway) = service(MockMode::Succeed);
        let id = record(&ledger, "10");

        let outcome = svc.mint_reading(&id, "wallet-1").await.unwrap();
        assert_eq!(outcome.token_amount, Decimal::from(10));
        assert_eq!(outcome.reading.mint_status, MintStatus::Minted);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_second_mint_is_conflict_without_second_call() {
        let (svc, ledger, gateway) = service(MockMode::Succeed);
        let id = record(&ledger, "10");

        svc.mint_reading(&id, "wallet-1").await.unwrap();
        let err = svc.mint_reading(&id, "wallet-1").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Reading(ReadingError::AlreadyMinted { .. })
        ));
        assert_eq!(gateway.call_count(), 1, "mint must not be re-issued");
    }

    #[tokio::test]
    async fn test_rejection_marks_failed_and_is_retryable() {
        let (svc, ledger, gateway) = service(MockMode::Reject);
        let id = record(&ledger, "10");

        let err = svc.mint_reading(&id, "wallet-1").await.unwrap_err();
        assert!(matches!(err, CoreError::Mint(MintError::Rejected(_))));
        assert_eq!(ledger.get(&id).unwrap().mint_status, MintStatus::MintFailed);

        // Retry issues a fresh call
        let err = svc.retry_mint(&id, "wallet-1").await.unwrap_err();
        assert!(matches!(err, CoreError::Mint(MintError::Rejected(_))));
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn test_timeout_leaves_reading_in_minting() {
        let (svc, ledger, _gateway) = service(MockMode::TimeOut);
        let id = record(&ledger, "10");

        let err = svc.mint_reading(&id, "wallet-1").await.unwrap_err();
        assert!(matches!(err, CoreError::Mint(MintError::Timeout)));
        // Deliberate asymmetry: timeout is NOT failure
        assert_eq!(ledger.get(&id).unwrap().mint_status, MintStatus::Minting);
    }

    #[tokio::test]
    async fn test_reconcile_stuck_reading_as_minted() {
        let (svc, ledger, _gateway) = service(MockMode::TimeOut);
        let id = record(&ledger, "10");
        let _ = svc.mint_reading(&id, "wallet-1").await;

        let reading = svc
            .reconcile(
                &id,
                Reconciliation::Minted {
                    tx_ref: "chain-tx-9".into(),
                },
            )
            .unwrap();
        assert_eq!(reading.mint_status, MintStatus::Minted);
        assert_eq!(reading.mint_tx_ref.as_deref(), Some("chain-tx-9"));
    }

    #[tokio::test]
    async fn test_reconcile_stuck_reading_as_not_executed() {
        let (svc, ledger, _gateway) = service(MockMode::TimeOut);
        let id = record(&ledger, "10");
        let _ = svc.mint_reading(&id, "wallet-1").await;

        let reading = svc.reconcile(&id, Reconciliation::NotExecuted).unwrap();
        assert_eq!(reading.mint_status, MintStatus::MintFailed);

        // And the failed reading can now be retried
        ledger.reset_for_retry(&id, 3).unwrap();
    }

    #[tokio::test]
    async fn test_oversized_reading_rejected_before_transition() {
        let (svc, ledger, gateway) = service(MockMode::Succeed);
        let id = record(&ledger, "150");

        let err = svc.mint_reading(&id, "wallet-1").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Reading(ReadingError::InvalidReading(_))
        ));
        assert_eq!(ledger.get(&id).unwrap().mint_status, MintStatus::Unminted);
        assert_eq!(gateway.call_count(), 0);
    }
}
