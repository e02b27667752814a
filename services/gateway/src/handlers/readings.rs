//! Meter reading endpoints
//!
//! Recording and minting are separate failures: a reading is always
//! recorded, aggregated and journaled before any mint attempt, and an
//! auto-mint that fails leaves the reading behind with its mint status
//! telling the caller what happened.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use metering::MintOutcome;
use persistence::EngineEvent;
use tracing::warn;
use types::errors::CoreError;
use types::escrow::AssetKind;
use types::ids::{MeterId, OwnerId, ReadingId, ZoneId};
use types::now_nanos;
use types::numeric::Quantity;
use types::reading::MintStatus;
use uuid::Uuid;

use crate::auth::OwnerIdentity;
use crate::error::AppError;
use crate::models::{MintResponse, ReadingResponse, SubmitReadingRequest, SubmitReadingResponse};
use crate::state::AppState;

pub async fn submit_reading(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Json(req): Json<SubmitReadingRequest>,
) -> Result<(StatusCode, Json<SubmitReadingResponse>), AppError> {
    let meter_id = MeterId::try_new(req.meter_id.as_str())
        .ok_or_else(|| AppError::BadRequest("meter_id must be non-empty".into()))?;
    let kwh = Quantity::try_new(req.kwh)
        .ok_or_else(|| AppError::BadRequest("kwh must be non-negative".into()))?;

    let reading = state
        .readings
        .record_reading(meter_id, ZoneId::new(req.zone_id), kwh, now_nanos())
        .map_err(CoreError::from)?;
    state.aggregator.observe(&reading);
    state
        .log
        .append(&EngineEvent::ReadingRecorded(reading.clone()))?;

    let auto_mint = req
        .auto_mint
        .unwrap_or(state.mint.config().auto_mint_enabled);
    let mint = if auto_mint {
        // A failed mint never fails the recording; the response carries
        // whatever status the attempt left behind.
        match drive_mint(&state, owner, &reading.reading_id, false).await {
            Ok(outcome) => Some(MintResponse::from(outcome)),
            Err(AppError::Core(e)) => {
                warn!(reading_id = %reading.reading_id, error = %e, "auto-mint failed");
                None
            }
            Err(other) => return Err(other),
        }
    } else {
        None
    };

    let reading = state
        .readings
        .get(&reading.reading_id)
        .map_err(CoreError::from)?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitReadingResponse {
            reading: reading.into(),
            mint,
        }),
    ))
}

pub async fn list_readings(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReadingResponse>>, AppError> {
    let readings = state
        .readings
        .list()
        .into_iter()
        .map(ReadingResponse::from)
        .collect();
    Ok(Json(readings))
}

pub async fn get_reading(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReadingResponse>, AppError> {
    let reading = state
        .readings
        .get(&ReadingId::from_uuid(id))
        .map_err(CoreError::from)?;
    Ok(Json(reading.into()))
}

/// Manual mint trigger; a reading whose last attempt failed is retried
/// under the bounded attempt cap
pub async fn mint_reading(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<MintResponse>, AppError> {
    let reading_id = ReadingId::from_uuid(id);
    let current = state.readings.get(&reading_id).map_err(CoreError::from)?;
    let retry = current.mint_status == MintStatus::MintFailed;

    let outcome = drive_mint(&state, owner, &reading_id, retry).await?;
    Ok(Json(outcome.into()))
}

/// Run one mint attempt, journal the resulting status transition and, on
/// confirmation, credit the proceeds to the owner's energy balance
pub(crate) async fn drive_mint(
    state: &AppState,
    owner: OwnerId,
    reading_id: &ReadingId,
    retry: bool,
) -> Result<MintOutcome, AppError> {
    let wallet = owner.to_string();
    let before = state
        .readings
        .get(reading_id)
        .map(|r| (r.mint_status, r.mint_attempts))
        .ok();

    let result = if retry {
        state.mint.retry_mint(reading_id, &wallet).await
    } else {
        state.mint.mint_reading(reading_id, &wallet).await
    };

    // Journal whatever transition the attempt performed, confirmed or not;
    // a timeout that leaves the reading in Minting must survive restart so
    // reconciliation still finds it.
    if let Ok(after) = state.readings.get(reading_id) {
        if before != Some((after.mint_status, after.mint_attempts)) {
            state.log.append(&EngineEvent::MintStatusChanged {
                reading_id: *reading_id,
                status: after.mint_status,
                mint_tx_ref: after.mint_tx_ref.clone(),
                mint_attempts: after.mint_attempts,
            })?;
        }
    }

    let outcome = result?;
    // Journal ahead of the credit so the proceeds can never fund a
    // journaled lock before their own deposit record lands in the log.
    state.log.append(&EngineEvent::BalanceDeposited {
        owner_id: owner,
        asset: AssetKind::EnergyToken,
        amount: outcome.token_amount,
    })?;
    state
        .engine
        .escrow()
        .credit(owner, AssetKind::EnergyToken, outcome.token_amount);
    Ok(outcome)
}
