//! Bounded drop-oldest event queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;
use tokio::sync::Notify;

/// A bounded FIFO queue that never blocks its producers.
///
/// When the queue is full, [`push`](Self::push) displaces the oldest queued
/// item instead of waiting, so a stalled consumer bounds staleness rather
/// than stalling whoever produces events. Intended for many producers and a
/// single consumer task awaiting [`pop`](Self::pop).
#[derive(Debug)]
pub struct EventQueue<T> {
    items: ArrayQueue<T>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl<T> EventQueue<T> {
    /// Creates a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            items: ArrayQueue::new(capacity.max(1)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueues an item, returning the oldest item if it had to be displaced.
    pub fn push(&self, item: T) -> Option<T> {
        let displaced = self.items.force_push(item);
        if displaced.is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        displaced
    }

    /// Waits for the next item.
    ///
    /// Returns `None` once the queue has been closed and fully drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            if let Some(item) = self.items.pop() {
                return Some(item);
            }
            if self.is_closed() {
                // An item may have been pushed between the pop above and close().
                return self.items.pop();
            }
            self.notify.notified().await;
        }
    }

    /// Takes the next item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.items.pop()
    }

    /// Closes the queue; the consumer drains what is left and then stops.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Total number of items displaced by drop-oldest since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
