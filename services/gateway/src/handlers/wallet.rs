//! Wallet endpoints
//!
//! Deposits stand in for the external wallet layer: currency has to enter
//! the system somewhere, and energy arrives through minting. Both land in
//! the same per-owner available balances the escrow ledger locks against.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use persistence::EngineEvent;
use rust_decimal::Decimal;
use types::escrow::AssetKind;

use crate::auth::OwnerIdentity;
use crate::error::AppError;
use crate::models::{BalanceResponse, DepositRequest};
use crate::state::AppState;

pub async fn deposit(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Json(req): Json<DepositRequest>,
) -> Result<(StatusCode, Json<BalanceResponse>), AppError> {
    if req.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "deposit amount must be strictly positive".into(),
        ));
    }

    // Journal first: a failed append leaves the balance untouched, and the
    // credit can never race a journaled lock it is meant to fund.
    state.log.append(&EngineEvent::BalanceDeposited {
        owner_id: owner,
        asset: req.asset,
        amount: req.amount,
    })?;
    state.engine.escrow().credit(owner, req.asset, req.amount);

    Ok((StatusCode::CREATED, Json(balances(&state, owner))))
}

pub async fn get_balances(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
) -> Result<Json<BalanceResponse>, AppError> {
    Ok(Json(balances(&state, owner)))
}

fn balances(state: &AppState, owner: types::ids::OwnerId) -> BalanceResponse {
    let escrow = state.engine.escrow();
    BalanceResponse {
        energy_available: escrow.available(&owner, AssetKind::EnergyToken),
        currency_available: escrow.available(&owner, AssetKind::CurrencyToken),
    }
}
