//! HTTP API server for live order event distribution.
//!
//! Provides REST endpoints for order management and a WebSocket stream of
//! order events, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch};
use domain::{Order, OrderEventQueue, OrderService, OrderStore};
use event_log::{EventPublisher, LogClient, PublishStats};
use fanout::{Broadcaster, SubscriberRegistry};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(routes::metrics::MetricsState {
            handle: metrics_handle,
            app: Arc::clone(&state),
        });

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            get(routes::orders::list).post(routes::orders::create),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get)
                .put(routes::orders::update)
                .delete(routes::orders::delete),
        )
        .route("/orders/{id}/amount", patch(routes::orders::adjust_amount))
        .route("/ws", get(routes::stream::subscribe))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Background tasks draining the two event queues.
pub struct Workers {
    broadcast_queue: Arc<OrderEventQueue>,
    publish_queue: Arc<OrderEventQueue>,
    broadcaster: JoinHandle<u64>,
    publisher: JoinHandle<PublishStats>,
}

/// Totals reported by the workers after shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub broadcast: u64,
    pub publish: PublishStats,
}

impl Workers {
    /// Closes both queues and waits for the workers to drain them.
    pub async fn shutdown(self) -> WorkerReport {
        self.broadcast_queue.close();
        self.publish_queue.close();

        let broadcast = self.broadcaster.await.unwrap_or_else(|error| {
            tracing::error!(%error, "broadcaster task failed");
            0
        });
        let publish = self.publisher.await.unwrap_or_else(|error| {
            tracing::error!(%error, "publisher task failed");
            PublishStats::default()
        });

        tracing::info!(
            broadcast,
            published = publish.published,
            publish_failures = publish.failed,
            "workers stopped"
        );
        WorkerReport { broadcast, publish }
    }
}

/// Orders preloaded when `SEED_ORDERS` is enabled.
pub fn seed_orders() -> Vec<Order> {
    vec![Order::new("1", "Item 1", 10), Order::new("2", "Item 2", 20)]
}

/// Wires the store, queues, registry and workers into application state.
///
/// Must be called from within a tokio runtime: the broadcaster and the
/// event publisher are spawned here.
pub fn create_default_state<L: LogClient + 'static>(
    config: &Config,
    log: L,
) -> (Arc<AppState>, Workers) {
    let store = if config.seed_orders {
        OrderStore::with_orders(seed_orders())
    } else {
        OrderStore::new()
    };

    let broadcast_queue = Arc::new(OrderEventQueue::new(config.broadcast_queue_capacity));
    let publish_queue = Arc::new(OrderEventQueue::new(config.publish_queue_capacity));
    let registry = Arc::new(SubscriberRegistry::new(config.subscriber_buffer));

    let order_service = OrderService::new(
        store,
        Arc::clone(&broadcast_queue),
        Arc::clone(&publish_queue),
    );

    let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&broadcast_queue)).spawn();
    let publisher = EventPublisher::new(log, Arc::clone(&publish_queue))
        .with_timeout(config.publish_timeout)
        .spawn();

    let state = Arc::new(AppState {
        order_service,
        registry,
    });
    let workers = Workers {
        broadcast_queue,
        publish_queue,
        broadcaster,
        publisher,
    };

    (state, workers)
}
