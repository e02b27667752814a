//! Grid status endpoint

use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::models::{GridStatusResponse, ZoneStatusResponse};
use crate::state::AppState;

pub async fn grid_status(
    State(state): State<AppState>,
) -> Result<Json<GridStatusResponse>, AppError> {
    let zones = state
        .aggregator
        .snapshot_all()
        .into_iter()
        .map(|stat| {
            let halted = state.engine.is_halted(stat.zone_id);
            (stat.zone_id.as_i32(), ZoneStatusResponse::from_stat(stat, halted))
        })
        .collect();

    Ok(Json(GridStatusResponse {
        active_meters: state.aggregator.active_meters_total(),
        zones,
    }))
}
