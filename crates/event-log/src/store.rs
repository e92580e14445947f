use async_trait::async_trait;

use crate::Result;

/// Client for an external append-only log (a topic of keyed records).
///
/// Implementations own connection handling and any retry policy; the
/// publisher calls [`publish`](LogClient::publish) exactly once per event.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LogClient: Send + Sync {
    /// Name of the topic records are appended to.
    fn topic(&self) -> &str;

    /// Appends one keyed record to the topic.
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<()>;
}

#[async_trait]
impl<L: LogClient + ?Sized> LogClient for std::sync::Arc<L> {
    fn topic(&self) -> &str {
        (**self).topic()
    }

    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        (**self).publish(key, payload).await
    }
}
