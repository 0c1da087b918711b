//! Per-room watcher task.
//!
//! A room is driven by a single task that owns its [`TimeoutController`].
//! Notifications arrive on an `mpsc` queue and the pending timeout is just
//! another branch of the same `select!`, so an expiry can never interleave
//! with an evaluation.

use std::collections::HashMap;
use std::ops::ControlFlow;

use tokio::sync::mpsc;
use tokio::time::Instant;

use roomsense_domain::entity::StateValue;
use roomsense_domain::evaluator;
use roomsense_domain::event::StateChange;
use roomsense_domain::id::EntityId;
use roomsense_domain::occupancy::OccupancyState;
use roomsense_domain::room::RoomConfig;

use crate::ports::{StatePublisher, StateReader};
use crate::timeout_controller::{PendingTimeout, TimeoutController};

/// Input of a room task.
#[derive(Debug, Clone)]
pub enum RoomMessage {
    /// A watched entity changed.
    StateChanged(StateChange),
    /// Notifications may have been lost; re-evaluate from current values.
    Resync,
    /// Stop the task.
    Shutdown,
}

/// Evaluates one room and publishes its derived state.
pub struct RoomWatcher<R, P> {
    config: RoomConfig,
    reader: R,
    publisher: P,
    controller: TimeoutController,
}

impl<R, P> RoomWatcher<R, P>
where
    R: StateReader + Send + Sync,
    P: StatePublisher + Send + Sync,
{
    #[must_use]
    pub fn new(config: RoomConfig, reader: R, publisher: P) -> Self {
        let controller = TimeoutController::new(config.timeout());
        Self {
            config,
            reader,
            publisher,
            controller,
        }
    }

    #[must_use]
    pub fn state(&self) -> OccupancyState {
        self.controller.state()
    }

    #[must_use]
    pub fn pending(&self) -> Option<PendingTimeout> {
        self.controller.pending()
    }

    /// Publish the initial unoccupied state, then evaluate once.
    pub async fn start(&mut self) {
        self.controller.reset(self.config.timeout());
        self.publish(OccupancyState::Unoccupied).await;
        self.evaluate().await;
    }

    /// Process one message. Breaks when the task should stop.
    pub async fn handle(&mut self, message: RoomMessage) -> ControlFlow<()> {
        match message {
            RoomMessage::StateChanged(change) => {
                if self.config.watches(&change.entity_id) {
                    tracing::trace!(
                        room = %self.config.entity_id(),
                        entity = %change.entity_id,
                        to = ?change.to,
                        "watched entity changed"
                    );
                    self.evaluate().await;
                }
                ControlFlow::Continue(())
            }
            RoomMessage::Resync => {
                tracing::debug!(room = %self.config.entity_id(), "resyncing room");
                self.evaluate().await;
                ControlFlow::Continue(())
            }
            RoomMessage::Shutdown => ControlFlow::Break(()),
        }
    }

    /// Read current values, run the evaluator and drive the controller.
    pub async fn evaluate(&mut self) {
        let snapshot = self.snapshot().await;
        let occupied = evaluator::evaluate(&self.config, self.controller.state(), &snapshot);
        let before = self.controller.pending();

        if let Some(state) = self.controller.on_evaluation(occupied, Instant::now()) {
            self.publish(state).await;
        }

        match (before, self.controller.pending()) {
            (_, Some(after)) if before != Some(after) => tracing::debug!(
                room = %self.config.entity_id(),
                generation = after.generation,
                timeout_secs = self.controller.timeout().as_secs(),
                "release timeout armed"
            ),
            (Some(_), None) => tracing::debug!(
                room = %self.config.entity_id(),
                "release timeout cancelled"
            ),
            _ => {}
        }
    }

    /// Handle the expiry of the timeout armed with `generation`.
    pub async fn expire(&mut self, generation: u64) {
        match self.controller.on_expiry(generation) {
            Some(state) => self.publish(state).await,
            None => tracing::trace!(
                room = %self.config.entity_id(),
                generation,
                "ignoring stale timeout"
            ),
        }
    }

    /// Drive the room until [`RoomMessage::Shutdown`] or until the queue closes.
    pub async fn run(mut self, mut rx: mpsc::Receiver<RoomMessage>) {
        self.start().await;

        loop {
            let pending = self.controller.pending();
            let deadline = pending.map_or_else(Instant::now, |p| p.deadline);

            tokio::select! {
                biased;
                message = rx.recv() => match message {
                    Some(message) => {
                        if self.handle(message).await.is_break() {
                            break;
                        }
                    }
                    None => break,
                },
                () = tokio::time::sleep_until(deadline), if pending.is_some() => {
                    if let Some(pending) = pending {
                        self.expire(pending.generation).await;
                    }
                }
            }
        }

        tracing::debug!(room = %self.config.entity_id(), "room watcher stopped");
    }

    async fn snapshot(&self) -> HashMap<EntityId, StateValue> {
        let mut snapshot = HashMap::new();
        for entity_id in self.config.watched() {
            match self.reader.get(&entity_id).await {
                Ok(Some(value)) => {
                    snapshot.insert(entity_id, value);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(
                    %err,
                    room = %self.config.entity_id(),
                    entity = %entity_id,
                    "failed to read entity, treating as inactive"
                ),
            }
        }
        snapshot
    }

    async fn publish(&self, state: OccupancyState) {
        let entity_id = self.config.entity_id();
        tracing::info!(room = %entity_id, %state, "publishing occupancy");
        if let Err(err) = self
            .publisher
            .publish(entity_id, state, self.config.attributes())
            .await
        {
            tracing::warn!(%err, room = %entity_id, "failed to publish occupancy");
        }
    }
}
