//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `BROADCAST_QUEUE_CAPACITY`: events buffered for the broadcaster (default: `256`)
/// - `PUBLISH_QUEUE_CAPACITY`: events buffered for the log publisher (default: `256`)
/// - `SUBSCRIBER_BUFFER`: events buffered per streaming client (default: `64`)
/// - `EVENT_LOG_TOPIC`: durable log topic (default: `"orders"`)
/// - `EVENT_LOG_DIR`: directory for the file-backed log; in-memory log when unset
/// - `PUBLISH_TIMEOUT_MS`: per-publish timeout, `0` disables (default: `5000`)
/// - `SEED_ORDERS`: preload two sample orders (default: `false`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub broadcast_queue_capacity: usize,
    pub publish_queue_capacity: usize,
    pub subscriber_buffer: usize,
    pub event_log_topic: String,
    pub event_log_dir: Option<PathBuf>,
    pub publish_timeout: Duration,
    pub seed_orders: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parse_env("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            broadcast_queue_capacity: parse_env("BROADCAST_QUEUE_CAPACITY")
                .unwrap_or(defaults.broadcast_queue_capacity),
            publish_queue_capacity: parse_env("PUBLISH_QUEUE_CAPACITY")
                .unwrap_or(defaults.publish_queue_capacity),
            subscriber_buffer: parse_env("SUBSCRIBER_BUFFER").unwrap_or(defaults.subscriber_buffer),
            event_log_topic: std::env::var("EVENT_LOG_TOPIC").unwrap_or(defaults.event_log_topic),
            event_log_dir: std::env::var("EVENT_LOG_DIR").ok().map(PathBuf::from),
            publish_timeout: parse_env("PUBLISH_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.publish_timeout),
            seed_orders: std::env::var("SEED_ORDERS")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.seed_orders),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            broadcast_queue_capacity: 256,
            publish_queue_capacity: 256,
            subscriber_buffer: fanout::DEFAULT_SUBSCRIBER_BUFFER,
            event_log_topic: "orders".to_string(),
            event_log_dir: None,
            publish_timeout: Duration::from_millis(5000),
            seed_orders: false,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
