//! # roomsense-adapter-mqtt
//!
//! MQTT adapter — connects roomsense to a host that mirrors its entity
//! states on an MQTT broker.
//!
//! ## Responsibilities
//! - Connect to the broker and keep the connection alive
//! - Subscribe to the state topic of every watched entity
//!   (re-subscribing after each reconnect)
//! - Parse incoming payloads and write them into the state store
//! - Publish every derived room state (`on`/`off`) and its attributes
//!   (JSON) as retained messages
//!
//! ## Dependency rule
//! Same as other adapters: depends on `roomsense-app` and `roomsense-domain`.

mod config;
mod error;
pub mod topic;

pub use config::MqttConfig;
pub use error::MqttError;

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use roomsense_app::ports::EventPublisher;
use roomsense_app::state_store::InMemoryStateStore;
use roomsense_domain::entity::{Attributes, StateValue};
use roomsense_domain::event::StateChange;
use roomsense_domain::id::EntityId;

use crate::topic::Topics;

const REQUEST_CAPACITY: usize = 64;
const RETRY_DELAY: Duration = Duration::from_secs(1);

type Shared<T> = Arc<RwLock<T>>;

/// A message to hand to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// Decode a raw state payload.
///
/// # Errors
///
/// Returns [`MqttError::PayloadEncoding`] if the payload is not UTF-8.
pub fn decode_state(payload: &[u8]) -> Result<Option<StateValue>, MqttError> {
    Ok(StateValue::parse(std::str::from_utf8(payload)?))
}

/// Messages mirroring the derived state of room `entity_id`.
///
/// A missing value clears both retained topics.
///
/// # Errors
///
/// Returns [`MqttError::Json`] if the attributes cannot be encoded.
pub fn room_messages(
    topics: &Topics,
    entity_id: &EntityId,
    value: Option<&StateValue>,
    attributes: &Attributes,
) -> Result<Vec<Outgoing>, MqttError> {
    let (state, attributes) = match value {
        Some(value) => (
            value.to_string().into_bytes(),
            serde_json::to_vec(attributes)?,
        ),
        None => (Vec::new(), Vec::new()),
    };
    Ok(vec![
        Outgoing {
            topic: topics.state(entity_id),
            payload: state,
            retain: true,
        },
        Outgoing {
            topic: topics.attributes(entity_id),
            payload: attributes,
            retain: true,
        },
    ])
}

/// Write one incoming message into `store`.
///
/// Messages on topics that are not state topics below the base are ignored.
///
/// # Errors
///
/// Returns an error if the payload is not UTF-8 or the store fails to
/// publish the resulting change.
pub async fn ingest<P: EventPublisher>(
    topics: &Topics,
    store: &InMemoryStateStore<P>,
    topic: &str,
    payload: &[u8],
) -> Result<Option<StateChange>, MqttError> {
    let Some(entity_id) = topics.parse_state(topic) else {
        tracing::trace!(topic, "ignoring message on unrelated topic");
        return Ok(None);
    };
    let value = decode_state(payload)?;
    Ok(store.set(entity_id, value).await?)
}

/// Running connection between the broker and the state store.
pub struct MqttBridge {
    client: AsyncClient,
    topics: Topics,
    watched: Shared<BTreeSet<EntityId>>,
    rooms: Shared<BTreeSet<EntityId>>,
    tasks: Vec<JoinHandle<()>>,
}

impl MqttBridge {
    /// Connect to the broker and start mirroring.
    ///
    /// Nothing is subscribed or published until [`MqttBridge::sync`] tells
    /// the bridge which entities to watch and which rooms to publish.
    pub fn start<P>(
        config: &MqttConfig,
        store: Arc<InMemoryStateStore<P>>,
        changes: broadcast::Receiver<StateChange>,
    ) -> Self
    where
        P: EventPublisher + Send + Sync + 'static,
    {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(config.keep_alive());

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let topics = Topics::new(config.base_topic.clone());
        let watched: Shared<BTreeSet<EntityId>> = Shared::default();
        let rooms: Shared<BTreeSet<EntityId>> = Shared::default();

        let inbound = tokio::spawn(inbound_loop(
            event_loop,
            client.clone(),
            topics.clone(),
            watched.clone(),
            store.clone(),
        ));
        let outbound = tokio::spawn(outbound_loop(
            changes,
            client.clone(),
            topics.clone(),
            rooms.clone(),
            store,
        ));

        tracing::info!(
            host = %config.broker_host,
            port = config.broker_port,
            base_topic = %config.base_topic,
            "MQTT bridge started"
        );

        Self {
            client,
            topics,
            watched,
            rooms,
            tasks: vec![inbound, outbound],
        }
    }

    /// Replace the watched entities and the published rooms.
    ///
    /// Call this before starting new rooms: changes of rooms that are not
    /// registered yet are not mirrored.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] if a (un)subscribe request cannot be
    /// queued.
    pub async fn sync(
        &self,
        watched: BTreeSet<EntityId>,
        rooms: BTreeSet<EntityId>,
    ) -> Result<(), MqttError> {
        let (added, removed) = {
            let mut current = self.watched.write().unwrap_or_else(PoisonError::into_inner);
            let added: Vec<EntityId> = watched.difference(&current).cloned().collect();
            let removed: Vec<EntityId> = current.difference(&watched).cloned().collect();
            *current = watched;
            (added, removed)
        };
        *self.rooms.write().unwrap_or_else(PoisonError::into_inner) = rooms;

        for entity_id in &added {
            self.client
                .subscribe(self.topics.state(entity_id), QoS::AtLeastOnce)
                .await?;
        }
        for entity_id in &removed {
            self.client.unsubscribe(self.topics.state(entity_id)).await?;
        }
        tracing::debug!(
            subscribed = added.len(),
            unsubscribed = removed.len(),
            "MQTT subscriptions updated"
        );
        Ok(())
    }

    /// Remove the retained state and attributes of `room` from the broker.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] if the publish requests cannot be queued.
    pub async fn clear(&self, room: &EntityId) -> Result<(), MqttError> {
        for message in room_messages(&self.topics, room, None, &Attributes::new())? {
            self.client
                .publish(message.topic, QoS::AtLeastOnce, message.retain, message.payload)
                .await?;
        }
        tracing::debug!(room = %room, "cleared retained room state");
        Ok(())
    }

    /// Disconnect and stop the background tasks.
    pub async fn stop(self) {
        if let Err(err) = self.client.disconnect().await {
            tracing::debug!(%err, "MQTT disconnect request failed");
        }
        for task in self.tasks {
            task.abort();
        }
        tracing::info!("MQTT bridge stopped");
    }
}

async fn inbound_loop<P: EventPublisher>(
    mut event_loop: EventLoop,
    client: AsyncClient,
    topics: Topics,
    watched: Shared<BTreeSet<EntityId>>,
    store: Arc<InMemoryStateStore<P>>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("connected to MQTT broker");
                let entities: Vec<EntityId> = watched
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .cloned()
                    .collect();
                for entity_id in entities {
                    if let Err(err) = client.try_subscribe(topics.state(&entity_id), QoS::AtLeastOnce)
                    {
                        tracing::warn!(%err, entity = %entity_id, "failed to resubscribe");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let topic = String::from_utf8_lossy(publish.topic.as_ref()).into_owned();
                if let Err(err) = ingest(&topics, &store, &topic, &publish.payload).await {
                    tracing::warn!(%err, topic = %topic, "failed to ingest MQTT message");
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(%err, "MQTT connection error, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

/// Rooms to republish after one receive from the change stream.
///
/// Only registered rooms are mirrored, so rooms must be registered through
/// [`MqttBridge::sync`] before they start. A lagging receiver republishes
/// every room. `None` means the stream closed.
fn room_targets(
    rooms: &BTreeSet<EntityId>,
    received: Result<StateChange, broadcast::error::RecvError>,
) -> Option<Vec<EntityId>> {
    match received {
        Ok(change) if rooms.contains(&change.entity_id) => Some(vec![change.entity_id]),
        Ok(_) => Some(Vec::new()),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "MQTT bridge lagged behind, republishing all rooms");
            Some(rooms.iter().cloned().collect())
        }
        Err(broadcast::error::RecvError::Closed) => None,
    }
}

async fn outbound_loop<P: EventPublisher>(
    mut changes: broadcast::Receiver<StateChange>,
    client: AsyncClient,
    topics: Topics,
    rooms: Shared<BTreeSet<EntityId>>,
    store: Arc<InMemoryStateStore<P>>,
) {
    loop {
        let received = changes.recv().await;
        let targets = {
            let rooms = rooms.read().unwrap_or_else(PoisonError::into_inner);
            match room_targets(&rooms, received) {
                Some(targets) => targets,
                None => break,
            }
        };

        for entity_id in targets {
            let record = store.record(&entity_id);
            let value = record.as_ref().and_then(|r| r.value.as_ref());
            let attributes = record.as_ref().map(|r| r.attributes.clone()).unwrap_or_default();
            let messages = match room_messages(&topics, &entity_id, value, &attributes) {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::warn!(%err, room = %entity_id, "failed to encode room state");
                    continue;
                }
            };
            for message in messages {
                if let Err(err) = client
                    .publish(message.topic, QoS::AtLeastOnce, message.retain, message.payload)
                    .await
                {
                    tracing::warn!(%err, room = %entity_id, "failed to publish room state");
                }
            }
        }
    }
}
