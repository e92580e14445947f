//! API server entry point.

use std::sync::Arc;

use api::Config;
use event_log::{FileEventLog, InMemoryEventLog, LogClient};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Opens the file-backed log when a directory is configured.
async fn open_event_log(config: &Config) -> Arc<dyn LogClient> {
    match &config.event_log_dir {
        Some(dir) => {
            let log = FileEventLog::open(dir, config.event_log_topic.clone())
                .await
                .expect("failed to open event log");
            tracing::info!(path = %log.path().display(), "using file event log");
            Arc::new(log)
        }
        None => {
            tracing::info!(topic = %config.event_log_topic, "using in-memory event log");
            Arc::new(InMemoryEventLog::new(config.event_log_topic.clone()))
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire state and start the delivery workers
    let log = open_event_log(&config).await;
    let (state, workers) = api::create_default_state(&config, log);

    // 4. Build the application
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 6. Drain queued events before exiting
    workers.shutdown().await;

    tracing::info!("server shut down gracefully");
}
