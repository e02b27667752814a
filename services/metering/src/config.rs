//! Minting policy configuration
//!
//! Loaded from environment variables with validated defaults; invalid
//! values fall back to the default with a warning rather than aborting
//! startup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

/// Configuration for the token minting path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintConfig {
    /// Whether reading submission may chain straight into minting
    pub auto_mint_enabled: bool,

    /// Conversion ratio from kWh to tokens (default: 1.0)
    pub kwh_to_token_ratio: Decimal,

    /// Maximum kWh allowed per reading at mint time (default: 100.0)
    pub max_reading_kwh: Decimal,

    /// Bounded timeout for the external mint call in seconds (default: 30)
    pub mint_timeout_secs: u64,

    /// Maximum number of mint attempts per reading (default: 3)
    pub max_mint_attempts: u32,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            auto_mint_enabled: true,
            kwh_to_token_ratio: Decimal::ONE,
            max_reading_kwh: Decimal::from(100),
            mint_timeout_secs: 30,
            max_mint_attempts: 3,
        }
    }
}

impl MintConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("MINT_AUTO_ENABLED") {
            match val.parse::<bool>() {
                Ok(enabled) => config.auto_mint_enabled = enabled,
                Err(_) => warn!("Failed to parse MINT_AUTO_ENABLED: {}, using default", val),
            }
        }

        if let Ok(val) = env::var("MINT_KWH_TO_TOKEN_RATIO") {
            match val.parse::<Decimal>() {
                Ok(ratio) if ratio > Decimal::ZERO => {
                    config.kwh_to_token_ratio = ratio;
                    info!("Using custom kWh to token ratio: {}", ratio);
                }
                Ok(_) => warn!(
                    "Invalid kWh to token ratio: {}, must be > 0, using default",
                    val
                ),
                Err(_) => warn!("Failed to parse kWh to token ratio: {}, using default", val),
            }
        }

        if let Ok(val) = env::var("MINT_MAX_READING_KWH") {
            match val.parse::<Decimal>() {
                Ok(max) if max > Decimal::ZERO => config.max_reading_kwh = max,
                _ => warn!("Invalid max reading kWh: {}, using default", val),
            }
        }

        if let Ok(val) = env::var("MINT_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.mint_timeout_secs = secs,
                _ => warn!("Invalid mint timeout: {}, using default", val),
            }
        }

        if let Ok(val) = env::var("MINT_MAX_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(attempts) if attempts > 0 => config.max_mint_attempts = attempts,
                _ => warn!("Invalid max mint attempts: {}, using default", val),
            }
        }

        config
    }

    /// Convert a kWh amount to the token amount it mints
    pub fn kwh_to_tokens(&self, kwh: Decimal) -> Decimal {
        kwh * self.kwh_to_token_ratio
    }
}
