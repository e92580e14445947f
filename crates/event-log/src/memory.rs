use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::{LogClient, PublishError, Result};

/// One record appended to the in-memory log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// Decodes the payload as JSON.
    pub fn payload_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
    }
}

#[derive(Debug, Default)]
struct InMemoryLogState {
    records: Vec<LogRecord>,
    fail_on_publish: bool,
}

/// In-memory event log for development and testing.
///
/// Records are kept in append order. Failures can be simulated with
/// [`set_fail_on_publish`](Self::set_fail_on_publish).
#[derive(Debug, Clone)]
pub struct InMemoryEventLog {
    topic: String,
    state: Arc<RwLock<InMemoryLogState>>,
}

impl InMemoryEventLog {
    /// Creates an empty log for the given topic.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            state: Arc::new(RwLock::new(InMemoryLogState::default())),
        }
    }

    /// Configures the log to reject publishes until reset.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .fail_on_publish = fail;
    }

    /// Returns all records appended so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .records
            .clone()
    }

    /// Returns the number of records appended so far.
    pub fn record_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .records
            .len()
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new("orders")
    }
}

#[async_trait]
impl LogClient for InMemoryEventLog {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        if state.fail_on_publish {
            return Err(PublishError::Unavailable(format!(
                "topic {} rejected write",
                self.topic
            )));
        }

        state.records.push(LogRecord {
            topic: self.topic.clone(),
            key: key.to_string(),
            payload,
        });
        Ok(())
    }
}
