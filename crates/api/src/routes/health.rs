//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub orders: usize,
    pub subscribers: usize,
    pub last_sequence: u64,
}

/// GET /health: returns system health status.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        orders: state.order_service.store().len(),
        subscribers: state.registry.len(),
        last_sequence: state.order_service.last_sequence().as_u64(),
    })
}
