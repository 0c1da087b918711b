//! Event bus port — publish state-change notifications.

use std::future::Future;

use roomsense_domain::error::RoomSenseError;
use roomsense_domain::event::StateChange;

/// Publishes state changes to interested subscribers.
pub trait EventPublisher {
    /// Publish a change to all current subscribers.
    fn publish(&self, change: StateChange)
    -> impl Future<Output = Result<(), RoomSenseError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        change: StateChange,
    ) -> impl Future<Output = Result<(), RoomSenseError>> + Send {
        (**self).publish(change)
    }
}
