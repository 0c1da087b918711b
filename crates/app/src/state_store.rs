//! In-memory host state store.
//!
//! Holds the latest value and attributes of every known entity and announces
//! changes on an [`EventPublisher`]. It implements both host ports, so rooms
//! can run against it directly; adapters (MQTT) feed it from the outside.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};

use roomsense_domain::entity::{Attributes, StateValue};
use roomsense_domain::error::RoomSenseError;
use roomsense_domain::event::{StateChange, Timestamp};
use roomsense_domain::id::EntityId;
use roomsense_domain::occupancy::OccupancyState;

use crate::ports::{EventPublisher, StatePublisher, StateReader};

/// Latest known state of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub value: Option<StateValue>,
    pub attributes: Attributes,
    pub last_changed: Timestamp,
}

/// Host state kept in process memory.
pub struct InMemoryStateStore<P> {
    entities: RwLock<HashMap<EntityId, EntityRecord>>,
    publisher: P,
}

impl<P: EventPublisher> InMemoryStateStore<P> {
    /// Create an empty store announcing changes on `publisher`.
    #[must_use]
    pub fn new(publisher: P) -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            publisher,
        }
    }

    /// Record a new value for `entity_id`, keeping its attributes.
    ///
    /// A notification is published only when the value differs from the
    /// stored one. Returns that notification, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if publishing the notification fails.
    pub async fn set(
        &self,
        entity_id: EntityId,
        value: Option<StateValue>,
    ) -> Result<Option<StateChange>, RoomSenseError> {
        self.write(entity_id, value, None).await
    }

    /// Record a new value and replace the attributes of `entity_id`.
    ///
    /// Publishes when either the value or the attributes changed.
    ///
    /// # Errors
    ///
    /// Returns an error if publishing the notification fails.
    pub async fn set_with_attributes(
        &self,
        entity_id: EntityId,
        value: Option<StateValue>,
        attributes: Attributes,
    ) -> Result<Option<StateChange>, RoomSenseError> {
        self.write(entity_id, value, Some(attributes)).await
    }

    /// Full record of `entity_id`, if it was ever reported.
    #[must_use]
    pub fn record(&self, entity_id: &EntityId) -> Option<EntityRecord> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .cloned()
    }

    /// Forget `entity_id`. Returns whether it was known.
    ///
    /// A removal is announced as a change to an unknown value.
    ///
    /// # Errors
    ///
    /// Returns an error if publishing the notification fails.
    pub async fn remove(&self, entity_id: &EntityId) -> Result<bool, RoomSenseError> {
        let removed = self
            .entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entity_id);

        match removed {
            Some(record) => {
                if record.value.is_some() {
                    let change = StateChange::new(entity_id.clone(), record.value, None);
                    self.publisher.publish(change).await?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn write(
        &self,
        entity_id: EntityId,
        value: Option<StateValue>,
        attributes: Option<Attributes>,
    ) -> Result<Option<StateChange>, RoomSenseError> {
        let change = {
            let mut entities = self
                .entities
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let previous = entities.get(&entity_id);
            let previous_value = previous.and_then(|r| r.value.clone());
            let value_changed = previous.is_none() || previous_value != value;
            let attributes_changed = attributes
                .as_ref()
                .is_some_and(|attrs| previous.is_none_or(|r| &r.attributes != attrs));

            if !value_changed && !attributes_changed {
                return Ok(None);
            }

            let change = StateChange::new(entity_id.clone(), previous_value, value.clone());
            let attributes = attributes
                .or_else(|| previous.map(|r| r.attributes.clone()))
                .unwrap_or_default();
            let last_changed = match previous {
                Some(r) if !value_changed => r.last_changed,
                _ => change.timestamp,
            };
            entities.insert(
                entity_id,
                EntityRecord {
                    value,
                    attributes,
                    last_changed,
                },
            );
            change
        };

        tracing::debug!(
            entity = %change.entity_id,
            from = ?change.from,
            to = ?change.to,
            "entity state changed"
        );
        self.publisher.publish(change.clone()).await?;
        Ok(Some(change))
    }
}

impl<P: EventPublisher + Send + Sync> StateReader for InMemoryStateStore<P> {
    fn get(
        &self,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<Option<StateValue>, RoomSenseError>> + Send {
        let value = self
            .record(entity_id)
            .and_then(|r| r.value)
            .filter(|v| !v.is_unknown());
        async { Ok(value) }
    }
}

impl<P: EventPublisher + Send + Sync> StatePublisher for InMemoryStateStore<P> {
    async fn publish(
        &self,
        entity_id: &EntityId,
        state: OccupancyState,
        attributes: Attributes,
    ) -> Result<(), RoomSenseError> {
        self.set_with_attributes(entity_id.clone(), Some(state.as_state_value()), attributes)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use roomsense_domain::entity::AttributeValue;
    use std::sync::Arc;

    fn id(raw: &str) -> EntityId {
        raw.parse().unwrap()
    }

    fn make_store() -> (InMemoryStateStore<Arc<InProcessEventBus>>, Arc<InProcessEventBus>) {
        let bus = Arc::new(InProcessEventBus::new(16));
        (InMemoryStateStore::new(bus.clone()), bus)
    }

    #[tokio::test]
    async fn should_publish_change_when_value_is_new() {
        let (store, bus) = make_store();
        let mut rx = bus.subscribe();

        store
            .set(id("binary_sensor.motion"), Some("on".into()))
            .await
            .unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.entity_id, id("binary_sensor.motion"));
        assert_eq!(change.from, None);
        assert_eq!(change.to, Some("on".into()));
    }

    #[tokio::test]
    async fn should_not_publish_when_value_is_unchanged() {
        let (store, _bus) = make_store();
        store
            .set(id("binary_sensor.motion"), Some("on".into()))
            .await
            .unwrap();

        let again = store
            .set(id("binary_sensor.motion"), Some("on".into()))
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn should_read_back_current_value() {
        let (store, _bus) = make_store();
        store
            .set(id("media_player.tv"), Some("playing".into()))
            .await
            .unwrap();

        let value = StateReader::get(&store, &id("media_player.tv")).await.unwrap();
        assert_eq!(value, Some("playing".into()));
    }

    #[tokio::test]
    async fn should_read_missing_and_unknown_as_none() {
        let (store, _bus) = make_store();
        store
            .set(id("media_player.tv"), Some("unknown".into()))
            .await
            .unwrap();

        assert_eq!(StateReader::get(&store, &id("media_player.tv")).await.unwrap(), None);
        assert_eq!(StateReader::get(&store, &id("sensor.absent")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_store_published_occupancy_with_attributes() {
        let (store, _bus) = make_store();
        let mut attrs = Attributes::new();
        attrs.insert("timeout".to_string(), AttributeValue::Int(30));

        StatePublisher::publish(
            &store,
            &id("binary_sensor.living_room"),
            OccupancyState::Occupied,
            attrs.clone(),
        )
        .await
        .unwrap();

        let record = store.record(&id("binary_sensor.living_room")).unwrap();
        assert_eq!(record.value, Some("on".into()));
        assert_eq!(record.attributes, attrs);
    }

    #[tokio::test]
    async fn should_publish_when_only_attributes_change() {
        let (store, _bus) = make_store();
        let entity = id("binary_sensor.living_room");
        let mut attrs = Attributes::new();
        attrs.insert("timeout".to_string(), AttributeValue::Int(30));
        store
            .set_with_attributes(entity.clone(), Some("off".into()), attrs.clone())
            .await
            .unwrap();
        let first_changed = store.record(&entity).unwrap().last_changed;

        attrs.insert("timeout".to_string(), AttributeValue::Int(60));
        let change = store
            .set_with_attributes(entity.clone(), Some("off".into()), attrs)
            .await
            .unwrap();

        assert!(change.is_some_and(|c| !c.is_value_change()));
        assert_eq!(store.record(&entity).unwrap().last_changed, first_changed);
    }

    #[tokio::test]
    async fn should_keep_attributes_when_setting_plain_value() {
        let (store, _bus) = make_store();
        let entity = id("binary_sensor.living_room");
        let mut attrs = Attributes::new();
        attrs.insert("room_name".to_string(), AttributeValue::from("Living Room"));
        store
            .set_with_attributes(entity.clone(), Some("off".into()), attrs.clone())
            .await
            .unwrap();

        store.set(entity.clone(), Some("on".into())).await.unwrap();

        assert_eq!(store.record(&entity).unwrap().attributes, attrs);
    }

    #[tokio::test]
    async fn should_announce_removal_as_unknown() {
        let (store, bus) = make_store();
        store
            .set(id("binary_sensor.motion"), Some("on".into()))
            .await
            .unwrap();
        let mut rx = bus.subscribe();

        assert!(store.remove(&id("binary_sensor.motion")).await.unwrap());
        assert!(!store.remove(&id("binary_sensor.motion")).await.unwrap());

        let change = rx.recv().await.unwrap();
        assert_eq!(change.from, Some("on".into()));
        assert_eq!(change.to, None);
    }
}
