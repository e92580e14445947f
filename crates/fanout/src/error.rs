//! Delivery error types.

use common::SubscriberId;
use thiserror::Error;

/// Reasons an event could not be handed to a subscriber.
///
/// Both are handled inside the broadcaster by removing the subscriber;
/// they never reach the code that committed the mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The subscriber's buffer is full; it is not keeping up.
    #[error("Subscriber {0} is not keeping up")]
    SlowConsumer(SubscriberId),

    /// The receiving side of the subscription has been dropped.
    #[error("Subscriber {0} disconnected")]
    Disconnected(SubscriberId),
}

impl DeliveryError {
    pub fn subscriber_id(&self) -> SubscriberId {
        match self {
            DeliveryError::SlowConsumer(id) | DeliveryError::Disconnected(id) => *id,
        }
    }
}
