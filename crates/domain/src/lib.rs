//! Domain layer for the order service.
//!
//! This crate provides:
//! - [`Order`] and its create/update inputs
//! - [`OrderStore`], the lock-guarded source of truth for current orders
//! - [`OrderEvent`], the sequenced record of one committed mutation
//! - [`OrderService`], which applies mutations and feeds the downstream queues

pub mod order;

pub use order::{
    EventKind, NewOrder, Order, OrderError, OrderEvent, OrderEventQueue, OrderService,
    OrderStore, OrderUpdate, SharedEvent,
};
