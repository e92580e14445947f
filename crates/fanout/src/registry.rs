//! Registry of connected streaming subscribers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use common::{Sequence, SubscriberId};
use tokio::sync::mpsc;

use crate::subscriber::{Liveness, LivenessCell, Subscriber, Subscription};

/// Default per-subscriber buffer, in events.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// The set of currently connected subscribers.
///
/// Registration, removal and snapshots all go through one mutex that is
/// held only to touch the map, never while delivering to a subscriber.
/// Subscribers are kept in registration order.
pub struct SubscriberRegistry {
    subscribers: Mutex<BTreeMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl SubscriberRegistry {
    /// Creates a registry whose subscribers buffer up to `buffer_size` events (minimum 1).
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SubscriberId, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a subscriber that accepts every event broadcast from now on.
    pub fn register(&self) -> Subscription {
        self.register_after(Sequence::zero())
    }

    /// Registers a subscriber that only accepts events sequenced after `watermark`.
    ///
    /// Pass the last committed sequence, read while no mutation can commit,
    /// so that events already queued at registration time are skipped.
    pub fn register_after(&self, watermark: Sequence) -> Subscription {
        let id = SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.buffer_size);
        let liveness = LivenessCell::new();

        let total = {
            let mut subscribers = self.lock();
            subscribers.insert(
                id,
                Subscriber::new(id, sender, liveness.clone(), watermark),
            );
            subscribers.len()
        };

        metrics::gauge!("subscribers_active").set(total as f64);
        tracing::info!(subscriber_id = %id, total, %watermark, "subscriber registered");

        Subscription::new(id, receiver, liveness)
    }

    /// Removes a subscriber and marks it closed.
    ///
    /// Idempotent; returns true only for the call that actually removed it.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, total) = {
            let mut subscribers = self.lock();
            let removed = subscribers.remove(&id);
            (removed, subscribers.len())
        };

        let Some(subscriber) = removed else {
            return false;
        };
        subscriber.mark(Liveness::Closed);
        metrics::gauge!("subscribers_active").set(total as f64);
        tracing::info!(subscriber_id = %id, total, "subscriber unregistered");
        true
    }

    /// Marks a subscriber as draining and removes it.
    pub(crate) fn evict(&self, subscriber: &Subscriber) -> bool {
        subscriber.mark(Liveness::Draining);
        self.unregister(subscriber.id())
    }

    /// Returns a copy of the active subscribers, in registration order.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}
