//! Integration tests wiring the order service to the broadcaster.

use std::sync::Arc;
use std::time::Duration;

use common::{OrderId, Sequence};
use domain::{EventKind, NewOrder, OrderEventQueue, OrderService, OrderStore, OrderUpdate};
use fanout::{Broadcaster, Liveness, SubscriberRegistry};

struct Pipeline {
    service: Arc<OrderService>,
    registry: Arc<SubscriberRegistry>,
    broadcast_queue: Arc<OrderEventQueue>,
    publish_queue: Arc<OrderEventQueue>,
}

fn pipeline(subscriber_buffer: usize) -> Pipeline {
    let broadcast_queue = Arc::new(OrderEventQueue::new(1024));
    let publish_queue = Arc::new(OrderEventQueue::new(1024));
    let registry = Arc::new(SubscriberRegistry::new(subscriber_buffer));
    let service = Arc::new(OrderService::new(
        OrderStore::new(),
        Arc::clone(&broadcast_queue),
        Arc::clone(&publish_queue),
    ));
    Pipeline {
        service,
        registry,
        broadcast_queue,
        publish_queue,
    }
}

impl Pipeline {
    fn broadcaster(&self) -> Broadcaster {
        Broadcaster::new(Arc::clone(&self.registry), Arc::clone(&self.broadcast_queue))
    }
}

async fn recv_within(sub: &mut fanout::Subscription) -> Option<domain::SharedEvent> {
    tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn subscriber_receives_every_mutation_in_order() {
    let p = pipeline(256);
    let mut sub = p.registry.register();
    let handle = p.broadcaster().spawn();

    p.service.create(NewOrder::with_id("1", "Widget", 10)).unwrap();
    p.service
        .update(&OrderId::new("1"), OrderUpdate::new("Widget", 12))
        .unwrap();
    p.service.adjust_amount(&OrderId::new("1"), -100).unwrap();
    p.service.delete(&OrderId::new("1")).unwrap();

    let mut received = Vec::new();
    for _ in 0..4 {
        received.push(recv_within(&mut sub).await.unwrap());
    }
    let sequences: Vec<_> = received.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=4).map(Sequence::new).collect::<Vec<_>>());
    assert_eq!(received[2].order.as_ref().unwrap().amount, 0);
    assert_eq!(received[3].kind, EventKind::Deleted);

    p.broadcast_queue.close();
    handle.await.unwrap();
    // publish path saw the same events independently
    assert_eq!(p.publish_queue.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mutations_reach_all_subscribers_in_order() {
    let p = pipeline(1024);
    let mut subs: Vec<_> = (0..3).map(|_| p.registry.register()).collect();
    let handle = p.broadcaster().spawn();

    let mut writers = Vec::new();
    for t in 0..8 {
        let service = Arc::clone(&p.service);
        writers.push(tokio::spawn(async move {
            let id = OrderId::new(format!("order-{t}"));
            service
                .create(NewOrder::with_id(id.clone(), "Widget", 0))
                .unwrap();
            for _ in 0..20 {
                service.adjust_amount(&id, 1).unwrap();
            }
        }));
    }
    for writer in writers {
        writer.await.unwrap();
    }
    p.broadcast_queue.close();
    assert_eq!(handle.await.unwrap(), 168);

    for sub in &mut subs {
        let mut sequences = Vec::new();
        while let Some(event) = sub.try_recv() {
            sequences.push(event.sequence.as_u64());
        }
        assert_eq!(sequences, (1..=168).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn saturated_subscriber_is_evicted_within_one_pass() {
    let p = pipeline(2);
    let mut healthy = p.registry.register();
    let stalled = p.registry.register();
    let broadcaster = p.broadcaster();

    for i in 0..3 {
        p.service
            .create(NewOrder::with_id(i.to_string(), "Widget", 1))
            .unwrap();
        let event = p.broadcast_queue.try_pop().unwrap();
        let report = broadcaster.broadcast(&event);
        healthy.try_recv().unwrap();
        if i == 2 {
            assert_eq!(report.evicted, 1);
        }
    }

    assert!(!p.registry.contains(stalled.id()));
    assert_eq!(stalled.liveness(), Liveness::Closed);
    assert_eq!(p.registry.len(), 1);

    p.service
        .create(NewOrder::with_id("3", "Widget", 1))
        .unwrap();
    let event = p.broadcast_queue.try_pop().unwrap();
    assert_eq!(broadcaster.broadcast(&event).delivered, 1);
    assert_eq!(healthy.try_recv().unwrap().sequence, Sequence::new(4));
}

#[tokio::test]
async fn unregister_during_stream_stops_delivery() {
    let p = pipeline(16);
    let mut sub = p.registry.register();
    let handle = p.broadcaster().spawn();

    p.service.create(NewOrder::with_id("1", "Widget", 1)).unwrap();
    assert!(recv_within(&mut sub).await.is_some());

    assert!(p.registry.unregister(sub.id()));
    p.service.create(NewOrder::with_id("2", "Widget", 1)).unwrap();

    assert!(recv_within(&mut sub).await.is_none());
    p.broadcast_queue.close();
    handle.await.unwrap();
}

#[tokio::test]
async fn late_subscriber_skips_events_queued_before_it_registered() {
    let p = pipeline(16);
    p.service.create(NewOrder::with_id("1", "Widget", 1)).unwrap();

    // Event 1 is still queued when the subscriber joins.
    let mut late = p
        .service
        .at_commit_barrier(|last| p.registry.register_after(last));
    p.service.create(NewOrder::with_id("2", "Widget", 1)).unwrap();

    let broadcaster = p.broadcaster();
    while let Some(event) = p.broadcast_queue.try_pop() {
        broadcaster.broadcast(&event);
    }

    assert_eq!(late.try_recv().unwrap().sequence, Sequence::new(2));
    assert!(late.try_recv().is_none());
}
