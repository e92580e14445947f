//! Forwarder draining the publish queue into the external log.

use std::sync::Arc;
use std::time::Duration;

use domain::{OrderEvent, OrderEventQueue};
use tokio::task::JoinHandle;

use crate::{LogClient, PublishError, Result};

/// Counters describing a publisher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub failed: u64,
}

/// Best-effort forwarder of order events to a [`LogClient`].
///
/// Drains its own queue on a single task and makes exactly one publish
/// attempt per event. Failures are logged and the event is dropped: delivery
/// is at-most-once, and a slow or failing log never stalls order mutations.
pub struct EventPublisher<L: LogClient> {
    client: L,
    queue: Arc<OrderEventQueue>,
    timeout: Option<Duration>,
}

impl<L: LogClient + 'static> EventPublisher<L> {
    /// Creates a publisher reading from `queue` and writing to `client`.
    pub fn new(client: L, queue: Arc<OrderEventQueue>) -> Self {
        Self {
            client,
            queue,
            timeout: None,
        }
    }

    /// Bounds each publish attempt; a zero duration disables the bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Serializes one event and makes a single publish attempt.
    pub async fn publish(&self, event: &OrderEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        let attempt = self.client.publish(event.key(), payload);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| PublishError::Timeout(limit))?,
            None => attempt.await,
        }
    }

    /// Drains the queue until it is closed and empty.
    pub async fn run(self) -> PublishStats {
        tracing::info!(topic = self.client.topic(), "event publisher started");
        let mut stats = PublishStats::default();

        while let Some(event) = self.queue.pop().await {
            match self.publish(&event).await {
                Ok(()) => {
                    stats.published += 1;
                    metrics::counter!("events_published_total").increment(1);
                    tracing::debug!(
                        sequence = %event.sequence,
                        order_id = %event.order_id,
                        "event published"
                    );
                }
                Err(error) => {
                    stats.failed += 1;
                    metrics::counter!("event_publish_failures_total").increment(1);
                    tracing::warn!(
                        %error,
                        sequence = %event.sequence,
                        order_id = %event.order_id,
                        topic = self.client.topic(),
                        "failed to publish event, dropping"
                    );
                }
            }
        }

        tracing::info!(
            published = stats.published,
            failed = stats.failed,
            "event publisher stopped"
        );
        stats
    }

    /// Spawns [`run`](Self::run) on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<PublishStats> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use common::{OrderId, Sequence};
    use domain::Order;

    use super::*;
    use crate::InMemoryEventLog;

    struct StalledLog;

    #[async_trait]
    impl LogClient for StalledLog {
        fn topic(&self) -> &str {
            "stalled"
        }

        async fn publish(&self, _key: &str, _payload: Vec<u8>) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn event(seq: u64, id: &str) -> Arc<OrderEvent> {
        Arc::new(OrderEvent::created(
            Sequence::new(seq),
            Order::new(id, "Widget", 1),
        ))
    }

    #[tokio::test]
    async fn publishes_json_keyed_by_order_id() {
        let log = InMemoryEventLog::new("orders");
        let queue = Arc::new(OrderEventQueue::new(8));
        let publisher = EventPublisher::new(log.clone(), Arc::clone(&queue));

        queue.push(event(1, "A-1"));
        queue.push(Arc::new(OrderEvent::deleted(
            Sequence::new(2),
            OrderId::new("A-1"),
        )));
        queue.close();

        let stats = publisher.run().await;
        assert_eq!(stats, PublishStats { published: 2, failed: 0 });

        let records = log.records();
        assert_eq!(records[0].key, "A-1");
        let first = records[0].payload_json().unwrap();
        assert_eq!(first["kind"], "created");
        assert_eq!(first["order"]["item"], "Widget");
        let second = records[1].payload_json().unwrap();
        assert_eq!(second["kind"], "deleted");
        assert!(second["order"].is_null());
    }

    #[tokio::test]
    async fn failure_is_dropped_and_next_event_continues() {
        let log = InMemoryEventLog::new("orders");
        let queue = Arc::new(OrderEventQueue::new(8));
        let publisher = EventPublisher::new(log.clone(), Arc::clone(&queue));

        log.set_fail_on_publish(true);
        assert!(publisher.publish(&event(1, "1")).await.is_err());
        log.set_fail_on_publish(false);
        publisher.publish(&event(2, "2")).await.unwrap();

        assert_eq!(log.record_count(), 1);
        assert_eq!(log.records()[0].key, "2");
    }

    #[tokio::test]
    async fn run_counts_failures_without_stopping() {
        let log = InMemoryEventLog::new("orders");
        log.set_fail_on_publish(true);
        let queue = Arc::new(OrderEventQueue::new(8));
        queue.push(event(1, "1"));
        queue.push(event(2, "2"));
        queue.close();

        let stats = EventPublisher::new(log.clone(), queue).run().await;
        assert_eq!(stats, PublishStats { published: 0, failed: 2 });
        assert_eq!(log.record_count(), 0);
    }

    #[tokio::test]
    async fn stalled_log_times_out() {
        let queue = Arc::new(OrderEventQueue::new(8));
        let publisher = EventPublisher::new(StalledLog, Arc::clone(&queue))
            .with_timeout(Duration::from_millis(20));

        let result = publisher.publish(&event(1, "1")).await;
        assert!(matches!(result, Err(PublishError::Timeout(_))));

        queue.push(event(2, "2"));
        queue.close();
        let stats = publisher.run().await;
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn spawned_publisher_drains_and_stops_on_close() {
        let log = InMemoryEventLog::new("orders");
        let queue = Arc::new(OrderEventQueue::new(8));
        let handle = EventPublisher::new(log.clone(), Arc::clone(&queue)).spawn();

        for seq in 1..=3 {
            queue.push(event(seq, &seq.to_string()));
        }
        queue.close();

        let stats = handle.await.unwrap();
        assert_eq!(stats.published, 3);
        let keys: Vec<_> = log.records().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["1", "2", "3"]);
    }

    #[test]
    fn zero_timeout_disables_bound() {
        let publisher = EventPublisher::new(
            InMemoryEventLog::default(),
            Arc::new(OrderEventQueue::new(1)),
        )
        .with_timeout(Duration::ZERO);
        assert!(publisher.timeout.is_none());
    }
}
