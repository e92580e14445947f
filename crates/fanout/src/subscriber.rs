//! Subscriber handles and liveness tracking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use common::{Sequence, SubscriberId};
use domain::SharedEvent;
use tokio::sync::mpsc;

use crate::error::DeliveryError;

/// Lifecycle of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Registered and receiving events.
    Active,
    /// Being evicted for falling behind.
    Draining,
    /// Removed from the registry; no further events will arrive.
    Closed,
}

impl Liveness {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Liveness::Active,
            1 => Liveness::Draining,
            _ => Liveness::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Liveness::Active => 0,
            Liveness::Draining => 1,
            Liveness::Closed => 2,
        }
    }
}

impl std::fmt::Display for Liveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Liveness::Active => write!(f, "Active"),
            Liveness::Draining => write!(f, "Draining"),
            Liveness::Closed => write!(f, "Closed"),
        }
    }
}

/// Liveness state shared between the registry and the transport side.
#[derive(Debug, Clone)]
pub(crate) struct LivenessCell(Arc<AtomicU8>);

impl LivenessCell {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(Liveness::Active.as_u8())))
    }

    pub(crate) fn get(&self) -> Liveness {
        Liveness::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` unless already closed. Closed is terminal.
    pub(crate) fn set(&self, next: Liveness) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != Liveness::Closed.as_u8()).then_some(next.as_u8())
            });
    }
}

/// Registry-side handle for one connected client.
///
/// Cheap to clone; snapshots of the registry hand out clones so delivery
/// never happens under the registry lock.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<SharedEvent>,
    liveness: LivenessCell,
    joined_after: Sequence,
}

impl Subscriber {
    pub(crate) fn new(
        id: SubscriberId,
        sender: mpsc::Sender<SharedEvent>,
        liveness: LivenessCell,
        joined_after: Sequence,
    ) -> Self {
        Self {
            id,
            sender,
            liveness,
            joined_after,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.get()
    }

    /// Last sequence committed before this subscriber registered.
    pub fn joined_after(&self) -> Sequence {
        self.joined_after
    }

    /// True for events committed after registration.
    pub fn accepts(&self, event: &SharedEvent) -> bool {
        event.sequence > self.joined_after
    }

    pub(crate) fn mark(&self, liveness: Liveness) {
        self.liveness.set(liveness);
    }

    /// Attempts a non-blocking send into the subscriber's buffer.
    pub fn try_deliver(&self, event: &SharedEvent) -> Result<(), DeliveryError> {
        self.sender
            .try_send(Arc::clone(event))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DeliveryError::SlowConsumer(self.id),
                mpsc::error::TrySendError::Closed(_) => DeliveryError::Disconnected(self.id),
            })
    }
}

/// Transport-side end of a registration.
///
/// The connection task reads events from here and forwards them to the
/// remote peer. When the registry drops the subscriber (unregister or
/// eviction), `recv` returns whatever was already buffered and then `None`.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<SharedEvent>,
    liveness: LivenessCell,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        receiver: mpsc::Receiver<SharedEvent>,
        liveness: LivenessCell,
    ) -> Self {
        Self {
            id,
            receiver,
            liveness,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next event; `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<SharedEvent> {
        self.receiver.recv().await
    }

    /// Takes a buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<SharedEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.get()
    }

    /// True once the registry has removed this subscriber.
    pub fn is_closed(&self) -> bool {
        self.liveness() == Liveness::Closed
    }
}
