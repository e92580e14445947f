//! Live fan-out of order events to streaming subscribers.
//!
//! This crate provides the push side of the order service:
//! - [`SubscriberRegistry`] tracking connected clients, one bounded channel each
//! - [`Subscription`], the receiving end handed to a connection task
//! - [`Broadcaster`], the single consumer that drains the broadcast queue and
//!   evicts subscribers that cannot keep up

pub mod broadcaster;
pub mod error;
pub mod registry;
pub mod subscriber;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use error::DeliveryError;
pub use registry::{DEFAULT_SUBSCRIBER_BUFFER, SubscriberRegistry};
pub use subscriber::{Liveness, Subscriber, Subscription};
