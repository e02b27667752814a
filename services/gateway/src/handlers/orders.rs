//! Order and trade endpoints
//!
//! The accepted order is journaled in its pre-matching state followed by
//! one TradeSettled record per fill the triggered pass produced, so replay
//! applies every fill exactly once. Engine mutation and the journal
//! appends it produces run under the zone gate, so concurrent requests
//! cannot interleave one zone's events out of causal order in the log.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use persistence::EngineEvent;
use types::errors::{CoreError, OrderError};
use types::escrow::AssetKind;
use types::ids::{OrderId, ZoneId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderStatus, Side};
use uuid::Uuid;

use crate::auth::OwnerIdentity;
use crate::error::AppError;
use crate::models::{CreateOrderRequest, CreateOrderResponse, OrderResponse, TradeResponse};
use crate::state::AppState;

pub async fn create_order(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    let price = Price::try_new(req.price).ok_or_else(|| {
        CoreError::from(OrderError::InvalidPrice(
            "price must be strictly positive".into(),
        ))
    })?;
    let amount = Quantity::try_new_positive(req.amount).ok_or_else(|| {
        CoreError::from(OrderError::InvalidAmount(
            "amount must be strictly positive".into(),
        ))
    })?;

    let zone_id = ZoneId::new(req.zone_id);
    let _gate = state.zone_gate(zone_id).await;
    let result = state
        .engine
        .submit_order(owner, zone_id, req.side, price, amount)?;

    // Pre-matching snapshot; the matching pass may already have filled the
    // live order, and those fills replay from the trade records below.
    let accepted = Order {
        filled_amount: Quantity::zero(),
        status: OrderStatus::Open,
        ..result.order.clone()
    };
    let (asset, locked) = match req.side {
        Side::BUY => (AssetKind::CurrencyToken, price.value_of(amount)),
        Side::SELL => (AssetKind::EnergyToken, amount.as_decimal()),
    };
    state.log.append(&EngineEvent::OrderAccepted(accepted))?;
    state.log.append(&EngineEvent::EscrowLocked {
        owner_id: owner,
        order_id: result.order.order_id,
        asset,
        amount: locked,
    })?;
    for trade in &result.trades {
        state.log.append(&EngineEvent::TradeSettled(trade.clone()))?;
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order: result.order.into(),
            trades: result.trades.into_iter().map(TradeResponse::from).collect(),
        }),
    ))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order_id = OrderId::from_uuid(id);
    let zone_id = state
        .engine
        .get_order(&order_id)
        .map(|o| o.zone_id)
        .ok_or_else(|| {
            CoreError::from(OrderError::NotFound {
                order_id: order_id.to_string(),
            })
        })?;

    let _gate = state.zone_gate(zone_id).await;
    let order = state
        .engine
        .cancel_order(owner, order_id)
        .map_err(CoreError::from)?;

    state.log.append(&EngineEvent::OrderCancelled {
        owner_id: owner,
        order_id,
    })?;
    state.log.append(&EngineEvent::EscrowReleased {
        owner_id: owner,
        order_id,
    })?;

    Ok(Json(order.into()))
}

pub async fn get_order(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order_id = OrderId::from_uuid(id);
    let order = state
        .engine
        .get_order(&order_id)
        // Other owners' orders are not addressable
        .filter(|o| o.owner_id == owner)
        .ok_or_else(|| {
            CoreError::from(OrderError::NotFound {
                order_id: order_id.to_string(),
            })
        })?;
    Ok(Json(order.into()))
}

pub async fn list_orders(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state
        .engine
        .orders_for(&owner)
        .into_iter()
        .map(OrderResponse::from)
        .collect();
    Ok(Json(orders))
}

/// Trades where the caller was on either side, in settlement order
pub async fn list_trades(
    State(state): State<AppState>,
    OwnerIdentity(owner): OwnerIdentity,
) -> Result<Json<Vec<TradeResponse>>, AppError> {
    let own_orders: std::collections::HashSet<OrderId> = state
        .engine
        .orders_for(&owner)
        .into_iter()
        .map(|o| o.order_id)
        .collect();
    let trades = state
        .engine
        .trades()
        .into_iter()
        .filter(|t| own_orders.contains(&t.buy_order_id) || own_orders.contains(&t.sell_order_id))
        .map(TradeResponse::from)
        .collect();
    Ok(Json(trades))
}
