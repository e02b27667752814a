//! HTTP adapter for the external token program
//!
//! The service-level timeout around `MintService::mint_reading` bounds the
//! whole call, so this client distinguishes only two failure shapes: a
//! definitive rejection (any HTTP error status) and an ambiguous outcome
//! (transport failure, or a 2xx whose body cannot be read), which maps to
//! `MintError::Timeout` so the reading stays in `Minting` for
//! reconciliation.

use async_trait::async_trait;
use metering::{MintGateway, MintReceipt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::errors::MintError;

pub struct HttpMintGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct MintCallRequest<'a> {
    owner_wallet: &'a str,
    token_amount: Decimal,
}

#[derive(Deserialize)]
struct MintCallResponse {
    tx_ref: String,
}

impl HttpMintGateway {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MintGateway for HttpMintGateway {
    async fn mint(
        &self,
        owner_wallet: &str,
        token_amount: Decimal,
    ) -> Result<MintReceipt, MintError> {
        let url = format!("{}/mint", self.base_url);
        debug!(%url, wallet = owner_wallet, tokens = %token_amount, "issuing mint call");

        let response = self
            .client
            .post(&url)
            .json(&MintCallRequest {
                owner_wallet,
                token_amount,
            })
            .send()
            .await
            // The request may have reached the token program before the
            // connection died; treat as ambiguous, never as a rejection.
            .map_err(|_| MintError::Timeout)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "no response body".to_string());
            return Err(MintError::Rejected(format!("{}: {}", status, detail)));
        }

        // A 2xx means the mint executed; losing the body here loses only
        // the tx reference, which reconciliation can recover.
        let body: MintCallResponse = response.json().await.map_err(|_| MintError::Timeout)?;
        Ok(MintReceipt { tx_ref: body.tx_ref })
    }
}
