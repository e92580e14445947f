use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when forwarding an event to the external log.
///
/// None of these are fatal: the publisher logs them and moves on to the
/// next event.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The log rejected the write or could not be reached.
    #[error("Event log unavailable: {0}")]
    Unavailable(String),

    /// An I/O error occurred while appending.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The event could not be serialized to the wire format.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The publish call did not complete in time.
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for event log operations.
pub type Result<T> = std::result::Result<T, PublishError>;
