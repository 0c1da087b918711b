//! Room service — registry of running rooms and notification dispatcher.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;

use roomsense_domain::error::{NotFoundError, RoomSenseError, ValidationError};
use roomsense_domain::event::StateChange;
use roomsense_domain::id::EntityId;
use roomsense_domain::room::RoomConfig;

use crate::ports::{StatePublisher, StateReader};
use crate::room_watcher::{RoomMessage, RoomWatcher};

/// Queue length of every room task.
pub const ROOM_QUEUE_CAPACITY: usize = 64;

struct RoomHandle {
    config: RoomConfig,
    tx: mpsc::Sender<RoomMessage>,
    task: JoinHandle<()>,
}

/// Outcome of [`RoomService::apply`], room ids sorted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<EntityId>,
    pub restarted: Vec<EntityId>,
    pub removed: Vec<EntityId>,
    pub unchanged: Vec<EntityId>,
}

/// Application service owning one watcher task per room.
pub struct RoomService<R, P> {
    reader: R,
    publisher: P,
    rooms: Mutex<HashMap<EntityId, RoomHandle>>,
}

impl<R, P> RoomService<R, P>
where
    R: StateReader + Clone + Send + Sync + 'static,
    P: StatePublisher + Clone + Send + Sync + 'static,
{
    /// Create an empty service. Every room reads and publishes through the
    /// given ports.
    #[must_use]
    pub fn new(reader: R, publisher: P) -> Self {
        Self {
            reader,
            publisher,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Start a room.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateRoom`] if a room with the same
    /// derived entity id is already running.
    #[tracing::instrument(skip(self, config), fields(room = %config.entity_id()))]
    pub async fn add(&self, config: RoomConfig) -> Result<EntityId, RoomSenseError> {
        let mut rooms = self.rooms.lock().await;
        let id = config.entity_id().clone();
        if rooms.contains_key(&id) {
            return Err(ValidationError::DuplicateRoom(id.to_string()).into());
        }
        rooms.insert(id.clone(), self.spawn(config));
        tracing::info!("room started");
        Ok(id)
    }

    /// Stop a room and return its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RoomSenseError::NotFound`] when no room with `id` runs.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, id: &EntityId) -> Result<RoomConfig, RoomSenseError> {
        let handle = self
            .rooms
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| not_found(id))?;
        let config = handle.config.clone();
        stop(id, handle).await;
        tracing::info!("room stopped");
        Ok(config)
    }

    /// Replace the configuration of room `id`.
    ///
    /// The room is restarted, so it starts over as unoccupied. A new name
    /// may move it to a new derived entity id.
    ///
    /// # Errors
    ///
    /// Returns [`RoomSenseError::NotFound`] when no room with `id` runs, or
    /// [`ValidationError::DuplicateRoom`] when the new id belongs to another
    /// room.
    #[tracing::instrument(skip(self, config))]
    pub async fn reconfigure(&self, id: &EntityId, config: RoomConfig) -> Result<(), RoomSenseError> {
        let mut rooms = self.rooms.lock().await;
        let new_id = config.entity_id().clone();
        if new_id != *id && rooms.contains_key(&new_id) {
            return Err(ValidationError::DuplicateRoom(new_id.to_string()).into());
        }
        let handle = rooms.remove(id).ok_or_else(|| not_found(id))?;
        stop(id, handle).await;
        rooms.insert(new_id.clone(), self.spawn(config));
        tracing::info!(new_id = %new_id, "room reconfigured");
        Ok(())
    }

    /// Reconcile the running rooms with `configs`.
    ///
    /// New rooms are started, rooms whose configuration changed are
    /// restarted, and rooms missing from `configs` are stopped. Identical
    /// rooms keep running with their current state.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateRoom`] when two configs derive the
    /// same entity id. Nothing is changed in that case.
    #[tracing::instrument(skip_all, fields(rooms = configs.len()))]
    pub async fn apply(&self, configs: Vec<RoomConfig>) -> Result<ReloadSummary, RoomSenseError> {
        let mut desired = BTreeMap::new();
        for config in configs {
            let id = config.entity_id().clone();
            if desired.contains_key(&id) {
                return Err(ValidationError::DuplicateRoom(id.to_string()).into());
            }
            desired.insert(id, config);
        }

        let mut rooms = self.rooms.lock().await;
        let mut summary = ReloadSummary::default();

        let stale: Vec<EntityId> = rooms
            .keys()
            .filter(|id| !desired.contains_key(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(handle) = rooms.remove(&id) {
                stop(&id, handle).await;
                summary.removed.push(id);
            }
        }

        for (id, config) in desired {
            match rooms.remove(&id) {
                Some(handle) if handle.config == config => {
                    rooms.insert(id.clone(), handle);
                    summary.unchanged.push(id);
                }
                Some(handle) => {
                    stop(&id, handle).await;
                    rooms.insert(id.clone(), self.spawn(config));
                    summary.restarted.push(id);
                }
                None => {
                    rooms.insert(id.clone(), self.spawn(config));
                    summary.added.push(id);
                }
            }
        }

        summary.removed.sort();
        tracing::info!(
            added = summary.added.len(),
            restarted = summary.restarted.len(),
            removed = summary.removed.len(),
            unchanged = summary.unchanged.len(),
            "rooms reloaded"
        );
        Ok(summary)
    }

    /// Ids of all running rooms, sorted.
    pub async fn rooms(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.rooms.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Configuration of room `id`, if it runs.
    pub async fn config(&self, id: &EntityId) -> Option<RoomConfig> {
        self.rooms.lock().await.get(id).map(|h| h.config.clone())
    }

    /// Forward `change` to every room watching its entity.
    ///
    /// Attribute-only re-reports are not forwarded: rooms only look at
    /// values. Returns how many rooms were notified.
    pub async fn dispatch(&self, change: &StateChange) -> usize {
        if !change.is_value_change() {
            return 0;
        }
        let targets: Vec<_> = self
            .rooms
            .lock()
            .await
            .values()
            .filter(|h| h.config.watches(&change.entity_id))
            .map(|h| (h.config.entity_id().clone(), h.tx.clone()))
            .collect();

        let mut notified = 0;
        for (room, tx) in targets {
            if tx
                .send(RoomMessage::StateChanged(change.clone()))
                .await
                .is_ok()
            {
                notified += 1;
            } else {
                tracing::warn!(room = %room, "room queue closed, dropping notification");
            }
        }
        notified
    }

    /// Ask every room to re-evaluate from current values.
    pub async fn resync_all(&self) {
        let senders: Vec<_> = self
            .rooms
            .lock()
            .await
            .values()
            .map(|h| h.tx.clone())
            .collect();
        for tx in senders {
            // closed queues belong to rooms being stopped
            let _ = tx.send(RoomMessage::Resync).await;
        }
    }

    /// Dispatch bus notifications until the bus closes.
    ///
    /// Lost notifications (a lagging receiver) trigger a resync of every room.
    pub async fn run(&self, mut rx: broadcast::Receiver<StateChange>) {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    self.dispatch(&change).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "dispatcher lagged behind, resyncing rooms");
                    self.resync_all().await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("dispatcher stopped");
    }

    /// Stop every room.
    pub async fn shutdown(&self) {
        let mut rooms = self.rooms.lock().await;
        for (id, handle) in rooms.drain() {
            stop(&id, handle).await;
        }
        tracing::info!("all rooms stopped");
    }

    fn spawn(&self, config: RoomConfig) -> RoomHandle {
        let (tx, rx) = mpsc::channel(ROOM_QUEUE_CAPACITY);
        let watcher = RoomWatcher::new(config.clone(), self.reader.clone(), self.publisher.clone());
        let task = tokio::spawn(watcher.run(rx));
        RoomHandle { config, tx, task }
    }
}

async fn stop(id: &EntityId, handle: RoomHandle) {
    // a closed queue means the task already ended
    let _ = handle.tx.send(RoomMessage::Shutdown).await;
    if let Err(err) = handle.task.await {
        tracing::warn!(%err, room = %id, "room task ended abnormally");
    }
}

fn not_found(id: &EntityId) -> RoomSenseError {
    NotFoundError {
        entity: "Room",
        id: id.to_string(),
    }
    .into()
}
