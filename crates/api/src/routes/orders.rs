//! Order CRUD endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{NewOrder, Order, OrderService, OrderUpdate};
use fanout::SubscriberRegistry;
use serde::Deserialize;

use crate::error::ApiError;

/// Shared application state.
pub struct AppState {
    pub order_service: OrderService,
    pub registry: Arc<SubscriberRegistry>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AdjustAmountRequest {
    pub delta: i64,
}

// -- Handlers --

/// GET /orders: list all orders in insertion order.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<Order>> {
    metrics::counter!("orders_total", "method" => "GET").increment(1);
    Json(state.order_service.list())
}

/// GET /orders/:id: fetch one order.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    metrics::counter!("orders_total", "method" => "GET").increment(1);
    state
        .order_service
        .get(&OrderId::new(id.as_str()))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))
}

/// POST /orders: create an order; the ID is generated when omitted.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(input) = payload?;
    let order = state.order_service.create(input)?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT /orders/:id: replace an existing order.
#[tracing::instrument(skip(state, payload))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<OrderUpdate>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(input) = payload?;
    let order = state.order_service.update(&OrderId::new(id), input)?;
    Ok(Json(order))
}

/// PATCH /orders/:id/amount: add a signed delta to the amount, clamped at zero.
#[tracing::instrument(skip(state, payload))]
pub async fn adjust_amount(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<AdjustAmountRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(req) = payload?;
    let order = state
        .order_service
        .adjust_amount(&OrderId::new(id), req.delta)?;
    Ok(Json(order))
}

/// DELETE /orders/:id: remove an order.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.order_service.delete(&OrderId::new(id))?;
    Ok(StatusCode::NO_CONTENT)
}
