//! Gateway configuration
//!
//! Environment-driven, with logged defaults for anything unset or
//! malformed so a bad variable never takes the service down at startup.

use metering::MintConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP listener binds to (`GATEWAY_BIND_ADDR`)
    pub bind_addr: SocketAddr,
    /// Directory for the event journal (`JOURNAL_DIR`)
    pub journal_dir: PathBuf,
    /// Base URL of the external token program (`MINT_GATEWAY_URL`);
    /// unset means the in-process mock, which always succeeds
    pub mint_gateway_url: Option<String>,
    pub mint: MintConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 8080).into(),
            journal_dir: PathBuf::from("./journal"),
            mint_gateway_url: None,
            mint: MintConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = match std::env::var("GATEWAY_BIND_ADDR") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "malformed GATEWAY_BIND_ADDR, using default");
                defaults.bind_addr
            }),
            Err(_) => defaults.bind_addr,
        };

        let journal_dir = std::env::var("JOURNAL_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.journal_dir);

        let mint_gateway_url = std::env::var("MINT_GATEWAY_URL").ok();

        Self {
            bind_addr,
            journal_dir,
            mint_gateway_url,
            mint: MintConfig::from_env(),
        }
    }
}
