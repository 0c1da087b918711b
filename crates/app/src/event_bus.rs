//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use roomsense_domain::error::RoomSenseError;
use roomsense_domain::event::StateChange;

use crate::ports::EventPublisher;

/// In-process notification bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the change is simply dropped). Slow subscribers observe
/// [`broadcast::error::RecvError::Lagged`] instead of blocking publishers.
pub struct InProcessEventBus {
    sender: broadcast::Sender<StateChange>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to changes on this bus.
    ///
    /// Returns a receiver that will get all changes published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(
        &self,
        change: StateChange,
    ) -> impl Future<Output = Result<(), RoomSenseError>> + Send {
        // send only fails when nobody listens
        let _ = self.sender.send(change);
        async { Ok(()) }
    }
}
