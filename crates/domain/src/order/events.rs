//! Order mutation events.

use chrono::{DateTime, Utc};
use common::{OrderId, Sequence};
use serde::{Deserialize, Serialize};

use super::Order;

/// The kind of mutation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one committed order mutation.
///
/// `order` carries the resulting snapshot for `Created` and `Updated`.
/// A `Deleted` event carries only the identifier; its `order` is `None`
/// (serialized as `null`), which is the tombstone marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub sequence: Sequence,
    pub kind: EventKind,
    pub order_id: OrderId,
    pub order: Option<Order>,
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    pub fn created(sequence: Sequence, order: Order) -> Self {
        Self::with_snapshot(sequence, EventKind::Created, order)
    }

    pub fn updated(sequence: Sequence, order: Order) -> Self {
        Self::with_snapshot(sequence, EventKind::Updated, order)
    }

    pub fn deleted(sequence: Sequence, order_id: OrderId) -> Self {
        Self {
            sequence,
            kind: EventKind::Deleted,
            order_id,
            order: None,
            timestamp: Utc::now(),
        }
    }

    fn with_snapshot(sequence: Sequence, kind: EventKind, order: Order) -> Self {
        Self {
            sequence,
            kind,
            order_id: order.id.clone(),
            order: Some(order),
            timestamp: Utc::now(),
        }
    }

    /// Returns true if this event marks a removed order.
    pub fn is_tombstone(&self) -> bool {
        self.kind == EventKind::Deleted
    }

    /// Partition key used when forwarding to the durable log.
    pub fn key(&self) -> &str {
        self.order_id.as_str()
    }
}
