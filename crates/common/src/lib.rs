//! Shared identifiers and the bounded event queue used across the workspace.

pub mod queue;
pub mod types;

pub use queue::EventQueue;
pub use types::{OrderId, Sequence, SubscriberId};
