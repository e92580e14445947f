//! Prometheus metrics endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::AppState;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// State for the scrape endpoint: the recorder handle plus the live
/// application state used to refresh point-in-time gauges.
#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
    pub app: Arc<AppState>,
}

/// GET /metrics: order, queue and subscriber metrics in Prometheus text format.
pub async fn get(State(state): State<MetricsState>) -> Response {
    let service = &state.app.order_service;
    metrics::gauge!("orders_current").set(service.store().len() as f64);
    metrics::gauge!("event_sequence_last").set(service.last_sequence().as_u64() as f64);

    ([(CONTENT_TYPE, PROMETHEUS_TEXT)], state.handle.render()).into_response()
}
