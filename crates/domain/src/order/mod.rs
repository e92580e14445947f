//! Orders, their store, and the mutation service.

mod events;
mod service;
mod store;
mod value_objects;

pub use events::{EventKind, OrderEvent};
pub use service::{OrderEventQueue, OrderService, SharedEvent};
pub use store::OrderStore;
pub use value_objects::{NewOrder, Order, OrderUpdate};

use common::OrderId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// An order with this ID already exists.
    #[error("Order already exists: {0}")]
    Conflict(OrderId),

    /// No order with this ID exists.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The request carried an invalid amount, delta, or identifier.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
