//! Fan-out loop delivering order events to every registered subscriber.

use std::sync::Arc;

use domain::{OrderEventQueue, SharedEvent};
use tokio::task::JoinHandle;

use crate::error::DeliveryError;
use crate::registry::SubscriberRegistry;

/// Outcome of delivering one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the event was handed to.
    pub delivered: usize,
    /// Subscribers removed during this pass (slow or disconnected).
    pub evicted: usize,
}

/// Drains the broadcast queue and fans each event out to subscribers.
///
/// Runs as a single consumer, so every subscriber observes events in
/// sequence order. Delivery is a non-blocking send: a subscriber whose
/// buffer is full is evicted in the same pass rather than waited on, so one
/// stalled client never delays the others.
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    queue: Arc<OrderEventQueue>,
}

impl Broadcaster {
    /// Creates a broadcaster reading from `queue` and delivering to `registry`.
    pub fn new(registry: Arc<SubscriberRegistry>, queue: Arc<OrderEventQueue>) -> Self {
        Self { registry, queue }
    }

    /// Delivers one event to every subscriber registered right now.
    ///
    /// Subscribers that registered after the event was committed skip it.
    pub fn broadcast(&self, event: &SharedEvent) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for subscriber in self.registry.snapshot() {
            if !subscriber.accepts(event) {
                continue;
            }
            match subscriber.try_deliver(event) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::SlowConsumer(id)) => {
                    if self.registry.evict(&subscriber) {
                        report.evicted += 1;
                        metrics::counter!("subscribers_evicted_total").increment(1);
                        tracing::warn!(
                            subscriber_id = %id,
                            sequence = %event.sequence,
                            "evicting slow subscriber"
                        );
                    }
                }
                Err(DeliveryError::Disconnected(id)) => {
                    if self.registry.unregister(id) {
                        report.evicted += 1;
                        tracing::debug!(subscriber_id = %id, "removed disconnected subscriber");
                    }
                }
            }
        }

        metrics::counter!("events_broadcast_total").increment(1);
        report
    }

    /// Runs until the queue is closed and drained; returns the number of events broadcast.
    pub async fn run(self) -> u64 {
        tracing::info!("broadcaster started");
        let mut broadcast = 0u64;

        while let Some(event) = self.queue.pop().await {
            let report = self.broadcast(&event);
            broadcast += 1;
            tracing::trace!(
                sequence = %event.sequence,
                delivered = report.delivered,
                evicted = report.evicted,
                "event broadcast"
            );
        }

        tracing::info!(events = broadcast, "broadcaster stopped");
        broadcast
    }

    /// Spawns [`run`](Self::run) on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<u64> {
        tokio::spawn(self.run())
    }
}
