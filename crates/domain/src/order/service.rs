//! Order service: applies mutations and emits sequenced events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::{EventQueue, OrderId, Sequence};

use super::{NewOrder, Order, OrderError, OrderEvent, OrderStore, OrderUpdate};

/// An event shared between the broadcast and publish queues.
pub type SharedEvent = Arc<OrderEvent>;

/// Queue of events consumed by a single downstream task.
pub type OrderEventQueue = EventQueue<SharedEvent>;

/// Service for mutating orders.
///
/// Each successful mutation is applied to the [`OrderStore`], stamped with
/// the next sequence number and handed to both downstream queues. Failed
/// mutations emit nothing and consume no sequence number.
///
/// The commit lock spans apply, stamp and enqueue so that sequence numbers
/// and queue order match the order in which the store applied mutations.
/// Enqueueing never blocks: a full queue drops its oldest event.
pub struct OrderService {
    store: OrderStore,
    last_sequence: Mutex<Sequence>,
    broadcast_queue: Arc<OrderEventQueue>,
    publish_queue: Arc<OrderEventQueue>,
}

impl OrderService {
    /// Creates a new order service over the given store and event queues.
    pub fn new(
        store: OrderStore,
        broadcast_queue: Arc<OrderEventQueue>,
        publish_queue: Arc<OrderEventQueue>,
    ) -> Self {
        Self {
            store,
            last_sequence: Mutex::new(Sequence::zero()),
            broadcast_queue,
            publish_queue,
        }
    }

    /// Returns the underlying store for read-only access.
    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    /// Returns the sequence number of the most recent event.
    pub fn last_sequence(&self) -> Sequence {
        *self.commit_lock()
    }

    /// Runs `f` with the last committed sequence while holding the commit lock.
    ///
    /// No mutation commits while `f` runs, so every event emitted afterwards
    /// carries a greater sequence than the one `f` observed. `f` must not
    /// call back into the service.
    pub fn at_commit_barrier<R>(&self, f: impl FnOnce(Sequence) -> R) -> R {
        let last = self.commit_lock();
        f(*last)
    }

    /// Returns a copy of one order.
    pub fn get(&self, id: &OrderId) -> Option<Order> {
        self.store.get(id)
    }

    /// Returns a snapshot of all orders in insertion order.
    pub fn list(&self) -> Vec<Order> {
        self.store.list()
    }

    /// Creates a new order.
    #[tracing::instrument(skip(self, input), fields(order_id))]
    pub fn create(&self, input: NewOrder) -> Result<Order, OrderError> {
        let order = input.into_order()?;
        tracing::Span::current().record("order_id", tracing::field::display(&order.id));

        let mut last = self.commit_lock();
        self.store
            .insert_new(order.clone())
            .map_err(|existing| OrderError::Conflict(existing.id))?;
        self.emit(&mut last, |seq| OrderEvent::created(seq, order.clone()));
        drop(last);

        metrics::counter!("orders_total", "method" => "POST").increment(1);
        tracing::info!(order_id = %order.id, amount = order.amount, "order created");
        Ok(order)
    }

    /// Replaces an existing order.
    #[tracing::instrument(skip(self, input))]
    pub fn update(&self, id: &OrderId, input: OrderUpdate) -> Result<Order, OrderError> {
        let order = input.into_order(id)?;

        let mut last = self.commit_lock();
        self.store
            .replace_existing(order.clone())
            .ok_or_else(|| OrderError::NotFound(id.clone()))?;
        self.emit(&mut last, |seq| OrderEvent::updated(seq, order.clone()));
        drop(last);

        metrics::counter!("orders_total", "method" => "PUT").increment(1);
        tracing::info!(order_id = %id, amount = order.amount, "order updated");
        Ok(order)
    }

    /// Adds `delta` to an order's amount; the result never goes below zero.
    #[tracing::instrument(skip(self))]
    pub fn adjust_amount(&self, id: &OrderId, delta: i64) -> Result<Order, OrderError> {
        let mut last = self.commit_lock();
        let order = self
            .store
            .adjust_amount(id, delta)
            .ok_or_else(|| OrderError::NotFound(id.clone()))?;
        self.emit(&mut last, |seq| OrderEvent::updated(seq, order.clone()));
        drop(last);

        metrics::counter!("orders_total", "method" => "PATCH").increment(1);
        tracing::info!(order_id = %id, delta, amount = order.amount, "order amount adjusted");
        Ok(order)
    }

    /// Deletes an order.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, id: &OrderId) -> Result<(), OrderError> {
        let mut last = self.commit_lock();
        self.store
            .delete(id)
            .ok_or_else(|| OrderError::NotFound(id.clone()))?;
        self.emit(&mut last, |seq| OrderEvent::deleted(seq, id.clone()));
        drop(last);

        metrics::counter!("orders_total", "method" => "DELETE").increment(1);
        tracing::info!(order_id = %id, "order deleted");
        Ok(())
    }

    fn commit_lock(&self) -> MutexGuard<'_, Sequence> {
        self.last_sequence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamps the next sequence number and enqueues the event on both queues.
    fn emit(&self, last: &mut Sequence, build: impl FnOnce(Sequence) -> OrderEvent) {
        *last = last.next();
        let event: SharedEvent = Arc::new(build(*last));

        Self::enqueue(&self.broadcast_queue, "broadcast", &event);
        Self::enqueue(&self.publish_queue, "publish", &event);
        metrics::counter!("events_enqueued_total").increment(1);
    }

    fn enqueue(queue: &OrderEventQueue, name: &'static str, event: &SharedEvent) {
        if let Some(dropped) = queue.push(Arc::clone(event)) {
            metrics::counter!("events_dropped_total", "queue" => name).increment(1);
            tracing::warn!(
                queue = name,
                dropped_sequence = %dropped.sequence,
                sequence = %event.sequence,
                "event queue full, dropped oldest event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::EventKind;

    struct Harness {
        service: OrderService,
        broadcast: Arc<OrderEventQueue>,
        publish: Arc<OrderEventQueue>,
    }

    fn harness(capacity: usize) -> Harness {
        let broadcast = Arc::new(OrderEventQueue::new(capacity));
        let publish = Arc::new(OrderEventQueue::new(capacity));
        let service = OrderService::new(
            OrderStore::new(),
            Arc::clone(&broadcast),
            Arc::clone(&publish),
        );
        Harness {
            service,
            broadcast,
            publish,
        }
    }

    fn drain(queue: &OrderEventQueue) -> Vec<SharedEvent> {
        std::iter::from_fn(|| queue.try_pop()).collect()
    }

    fn id(s: &str) -> OrderId {
        OrderId::new(s)
    }

    #[test]
    fn create_then_get() {
        let h = harness(16);
        let created = h
            .service
            .create(NewOrder::with_id("1", "Widget", 10))
            .unwrap();
        assert_eq!(created, Order::new("1", "Widget", 10));
        assert_eq!(h.service.get(&id("1")), Some(Order::new("1", "Widget", 10)));
    }

    #[test]
    fn create_duplicate_is_conflict() {
        let h = harness(16);
        h.service
            .create(NewOrder::with_id("1", "Widget", 10))
            .unwrap();

        let result = h.service.create(NewOrder::with_id("1", "Other", 1));
        assert!(matches!(result, Err(OrderError::Conflict(ref c)) if c == &id("1")));
        assert_eq!(drain(&h.broadcast).len(), 1);
        assert_eq!(h.service.last_sequence(), Sequence::new(1));
    }

    #[test]
    fn commit_barrier_sees_last_committed_sequence() {
        let h = harness(16);
        assert_eq!(h.service.at_commit_barrier(|seq| seq), Sequence::zero());

        h.service
            .create(NewOrder::with_id("1", "Widget", 10))
            .unwrap();
        let observed = h.service.at_commit_barrier(|seq| seq);
        h.service.delete(&id("1")).unwrap();

        assert_eq!(observed, Sequence::new(1));
        let events = drain(&h.broadcast);
        assert!(events.iter().skip(1).all(|e| e.sequence > observed));
    }

    #[test]
    fn create_generates_id_when_missing() {
        let h = harness(16);
        let created = h.service.create(NewOrder::generated("Widget", 1)).unwrap();
        assert!(h.service.get(&created.id).is_some());
    }

    #[test]
    fn update_missing_is_not_found() {
        let h = harness(16);
        let result = h.service.update(&id("1"), OrderUpdate::new("Widget", 1));
        assert!(matches!(result, Err(OrderError::NotFound(_))));
        assert!(h.broadcast.is_empty());
        assert!(h.publish.is_empty());
    }

    #[test]
    fn update_replaces_order() {
        let h = harness(16);
        h.service
            .create(NewOrder::with_id("1", "Widget", 10))
            .unwrap();
        let updated = h
            .service
            .update(&id("1"), OrderUpdate::new("Gadget", 3))
            .unwrap();
        assert_eq!(updated, Order::new("1", "Gadget", 3));

        let events = drain(&h.broadcast);
        assert_eq!(events[1].kind, EventKind::Updated);
        assert_eq!(events[1].order, Some(Order::new("1", "Gadget", 3)));
    }

    #[test]
    fn adjust_amount_clamps_and_emits_update() {
        let h = harness(16);
        h.service
            .create(NewOrder::with_id("1", "Widget", 5))
            .unwrap();
        let adjusted = h.service.adjust_amount(&id("1"), -1000).unwrap();
        assert_eq!(adjusted.amount, 0);

        let events = drain(&h.publish);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::Updated);
        assert_eq!(events[1].order.as_ref().unwrap().amount, 0);
    }

    #[test]
    fn adjust_amount_missing_is_not_found() {
        let h = harness(16);
        let result = h.service.adjust_amount(&id("missing"), 1);
        assert!(matches!(result, Err(OrderError::NotFound(_))));
    }

    #[test]
    fn delete_emits_tombstone() {
        let h = harness(16);
        h.service
            .create(NewOrder::with_id("1", "Widget", 10))
            .unwrap();
        h.service.delete(&id("1")).unwrap();
        assert!(h.service.get(&id("1")).is_none());

        let events = drain(&h.broadcast);
        assert!(events[1].is_tombstone());
        assert_eq!(events[1].order_id, id("1"));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let h = harness(16);
        let result = h.service.delete(&id("missing"));
        assert!(matches!(result, Err(OrderError::NotFound(_))));
    }

    #[test]
    fn invalid_input_emits_nothing() {
        let h = harness(16);
        let result = h.service.create(NewOrder::with_id("1", "Widget", -3));
        assert!(matches!(result, Err(OrderError::InvalidInput(_))));
        assert!(h.service.get(&id("1")).is_none());
        assert_eq!(h.service.last_sequence(), Sequence::zero());
    }

    #[test]
    fn every_mutation_gets_next_sequence_on_both_queues() {
        let h = harness(16);
        h.service.create(NewOrder::with_id("1", "A", 1)).unwrap();
        h.service.create(NewOrder::with_id("2", "B", 2)).unwrap();
        h.service.adjust_amount(&id("1"), 4).unwrap();
        h.service.delete(&id("2")).unwrap();

        let broadcast: Vec<_> = drain(&h.broadcast).iter().map(|e| e.sequence).collect();
        let published: Vec<_> = drain(&h.publish).iter().map(|e| e.sequence).collect();
        let expected: Vec<_> = (1..=4).map(Sequence::new).collect();
        assert_eq!(broadcast, expected);
        assert_eq!(published, expected);
    }

    #[test]
    fn full_queue_drops_oldest_without_failing_mutation() {
        let h = harness(2);
        for i in 0..5 {
            h.service
                .create(NewOrder::with_id(i.to_string(), "Widget", 1))
                .unwrap();
        }
        assert_eq!(h.service.list().len(), 5);

        let kept: Vec<_> = drain(&h.broadcast).iter().map(|e| e.sequence).collect();
        assert_eq!(kept, vec![Sequence::new(4), Sequence::new(5)]);
        assert_eq!(h.broadcast.dropped(), 3);
        assert_eq!(h.publish.dropped(), 3);
    }

    #[test]
    fn concurrent_mutations_enqueue_in_sequence_order() {
        let h = Arc::new(harness(4096));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let h = Arc::clone(&h);
                std::thread::spawn(move || {
                    let key = format!("order-{t}");
                    h.service
                        .create(NewOrder::with_id(key.as_str(), "Widget", 0))
                        .unwrap();
                    for _ in 0..50 {
                        h.service.adjust_amount(&OrderId::new(key.as_str()), 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sequences: Vec<u64> = drain(&h.broadcast)
            .iter()
            .map(|e| e.sequence.as_u64())
            .collect();
        assert_eq!(sequences, (1..=408).collect::<Vec<_>>());
        for order in h.service.list() {
            assert_eq!(order.amount, 50);
        }
    }
}
