//! Room — the configuration of one derived occupancy sensor.
//!
//! A room watches two sets of entities:
//! - **trigger** entities (motion sensors, door contacts) can switch the room
//!   from unoccupied to occupied on their own;
//! - **keep** entities (a TV playing, a desk lamp) are only consulted once the
//!   room is already occupied, to keep it that way.
//!
//! A room falls back to unoccupied `timeout` after the last inactive reading.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::entity::{AttributeValue, Attributes, StateValue};
use crate::error::{RoomSenseError, ValidationError};
use crate::id::{EntityId, slugify};

/// Name used when none is configured.
pub const DEFAULT_NAME: &str = "Room Occupancy Sensor";

/// Cool-down used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest accepted cool-down: one year.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Host domain of the derived entity.
pub const DERIVED_DOMAIN: &str = "binary_sensor";

/// Values treated as active when none are configured.
#[must_use]
pub fn default_active_values() -> Vec<StateValue> {
    vec![
        StateValue::from("on"),
        StateValue::from("occupied"),
        StateValue::Int(1),
        StateValue::Bool(true),
        StateValue::from("active"),
    ]
}

/// Immutable, validated room configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomConfig {
    name: String,
    entity_id: EntityId,
    trigger_entities: BTreeSet<EntityId>,
    keep_entities: BTreeSet<EntityId>,
    active_values: Vec<StateValue>,
    timeout: Duration,
}

impl RoomConfig {
    /// Create a builder for constructing a [`RoomConfig`].
    #[must_use]
    pub fn builder() -> RoomConfigBuilder {
        RoomConfigBuilder::default()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id under which the derived state is published (`binary_sensor.<slug>`).
    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    #[must_use]
    pub fn trigger_entities(&self) -> &BTreeSet<EntityId> {
        &self.trigger_entities
    }

    #[must_use]
    pub fn keep_entities(&self) -> &BTreeSet<EntityId> {
        &self.keep_entities
    }

    #[must_use]
    pub fn active_values(&self) -> &[StateValue] {
        &self.active_values
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Every entity the room needs change notifications for.
    #[must_use]
    pub fn watched(&self) -> BTreeSet<EntityId> {
        self.trigger_entities
            .union(&self.keep_entities)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn watches(&self, entity_id: &EntityId) -> bool {
        self.trigger_entities.contains(entity_id) || self.keep_entities.contains(entity_id)
    }

    /// Whether `value` counts as presence for this room.
    ///
    /// Placeholder values (`unknown`, `unavailable`) never count.
    #[must_use]
    pub fn is_active(&self, value: &StateValue) -> bool {
        !value.is_unknown() && self.active_values.iter().any(|v| v.matches(value))
    }

    /// Attributes published next to the derived state, for observability.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        let ids = |set: &BTreeSet<EntityId>| {
            serde_json::Value::Array(
                set.iter()
                    .map(|id| serde_json::Value::String(id.to_string()))
                    .collect(),
            )
        };
        let active = self.active_values.iter().map(state_value_to_json).collect();
        let timeout = i64::try_from(self.timeout.as_secs()).unwrap_or(i64::MAX);

        let mut attrs = Attributes::new();
        attrs.insert("room_name".to_string(), self.name.clone().into());
        attrs.insert("device_class".to_string(), "occupancy".into());
        attrs.insert("timeout".to_string(), timeout.into());
        attrs.insert(
            "entities_toggle".to_string(),
            ids(&self.trigger_entities).into(),
        );
        attrs.insert("entities_keep".to_string(), ids(&self.keep_entities).into());
        attrs.insert(
            "active_states".to_string(),
            AttributeValue::Json(serde_json::Value::Array(active)),
        );
        attrs
    }
}

fn state_value_to_json(value: &StateValue) -> serde_json::Value {
    match value {
        StateValue::Bool(b) => serde_json::Value::Bool(*b),
        StateValue::Int(i) => serde_json::Value::from(*i),
        StateValue::Float(x) => serde_json::Number::from_f64(*x)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        StateValue::String(s) => serde_json::Value::String(s.clone()),
    }
}

/// Step-by-step builder for [`RoomConfig`].
#[derive(Debug, Default)]
pub struct RoomConfigBuilder {
    name: Option<String>,
    trigger_entities: BTreeSet<EntityId>,
    keep_entities: BTreeSet<EntityId>,
    active_values: Option<Vec<StateValue>>,
    timeout: Option<Duration>,
}

impl RoomConfigBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn trigger_entity(mut self, entity_id: EntityId) -> Self {
        self.trigger_entities.insert(entity_id);
        self
    }

    #[must_use]
    pub fn trigger_entities(mut self, entity_ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.trigger_entities.extend(entity_ids);
        self
    }

    #[must_use]
    pub fn keep_entity(mut self, entity_id: EntityId) -> Self {
        self.keep_entities.insert(entity_id);
        self
    }

    #[must_use]
    pub fn keep_entities(mut self, entity_ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.keep_entities.extend(entity_ids);
        self
    }

    /// Add an active value. The first call replaces the defaults.
    #[must_use]
    pub fn active_value(mut self, value: impl Into<StateValue>) -> Self {
        self.active_values
            .get_or_insert_with(Vec::new)
            .push(value.into());
        self
    }

    /// Replace the active values.
    #[must_use]
    pub fn active_values(mut self, values: impl IntoIterator<Item = StateValue>) -> Self {
        self.active_values = Some(values.into_iter().collect());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Consume the builder, validate, and return a [`RoomConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RoomSenseError::Validation`] if the name has no usable
    /// characters, the timeout is zero or above [`MAX_TIMEOUT`], or no
    /// trigger entity was given.
    pub fn build(self) -> Result<RoomConfig, RoomSenseError> {
        let name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_string());
        let slug = slugify(&name);
        if name.trim().is_empty() || slug.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ValidationError::ZeroTimeout.into());
        }
        if timeout > MAX_TIMEOUT {
            return Err(ValidationError::TimeoutTooLong(MAX_TIMEOUT.as_secs()).into());
        }
        if self.trigger_entities.is_empty() {
            return Err(ValidationError::NoTriggerEntities.into());
        }

        let mut active_values = Vec::new();
        for value in self.active_values.unwrap_or_else(default_active_values) {
            if !active_values.contains(&value) {
                active_values.push(value);
            }
        }

        Ok(RoomConfig {
            entity_id: EntityId::new(DERIVED_DOMAIN, &slug)?,
            name,
            trigger_entities: self.trigger_entities,
            keep_entities: self.keep_entities,
            active_values,
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> EntityId {
        raw.parse().unwrap()
    }

    fn living_room() -> RoomConfig {
        RoomConfig::builder()
            .name("Living Room")
            .trigger_entity(id("binary_sensor.motion"))
            .keep_entity(id("media_player.tv"))
            .active_value("on")
            .active_value("playing")
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap()
    }

    #[test]
    fn should_derive_entity_id_from_name() {
        let room = living_room();
        assert_eq!(room.entity_id().as_str(), "binary_sensor.living_room");
    }

    #[test]
    fn should_apply_defaults() {
        let room = RoomConfig::builder()
            .trigger_entity(id("binary_sensor.motion"))
            .build()
            .unwrap();
        assert_eq!(room.name(), DEFAULT_NAME);
        assert_eq!(room.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(room.active_values(), default_active_values().as_slice());
    }

    #[test]
    fn should_reject_empty_name() {
        let result = RoomConfig::builder()
            .name("  ")
            .trigger_entity(id("binary_sensor.motion"))
            .build();
        assert!(matches!(
            result,
            Err(RoomSenseError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_reject_zero_timeout() {
        let result = RoomConfig::builder()
            .trigger_entity(id("binary_sensor.motion"))
            .timeout(Duration::ZERO)
            .build();
        assert!(matches!(
            result,
            Err(RoomSenseError::Validation(ValidationError::ZeroTimeout))
        ));
    }

    #[test]
    fn should_reject_timeout_above_maximum() {
        let result = RoomConfig::builder()
            .trigger_entity(id("binary_sensor.motion"))
            .timeout(Duration::from_secs(i64::MAX as u64))
            .build();
        assert!(matches!(
            result,
            Err(RoomSenseError::Validation(ValidationError::TimeoutTooLong(_)))
        ));
    }

    #[test]
    fn should_accept_maximum_timeout() {
        let room = RoomConfig::builder()
            .trigger_entity(id("binary_sensor.motion"))
            .timeout(MAX_TIMEOUT)
            .build()
            .unwrap();
        assert_eq!(room.timeout(), MAX_TIMEOUT);
    }

    #[test]
    fn should_reject_room_without_trigger_entities() {
        let result = RoomConfig::builder()
            .keep_entity(id("media_player.tv"))
            .build();
        assert!(matches!(
            result,
            Err(RoomSenseError::Validation(
                ValidationError::NoTriggerEntities
            ))
        ));
    }

    #[test]
    fn should_deduplicate_active_values() {
        let room = RoomConfig::builder()
            .trigger_entity(id("binary_sensor.motion"))
            .active_values(vec!["on".into(), "on".into(), StateValue::Int(1)])
            .build()
            .unwrap();
        assert_eq!(room.active_values().len(), 2);
    }

    #[test]
    fn should_watch_union_of_trigger_and_keep_entities() {
        let room = RoomConfig::builder()
            .trigger_entities([id("binary_sensor.a"), id("binary_sensor.b")])
            .keep_entities([id("binary_sensor.b"), id("media_player.tv")])
            .build()
            .unwrap();
        let watched: Vec<_> = room.watched().into_iter().map(String::from).collect();
        assert_eq!(
            watched,
            vec!["binary_sensor.a", "binary_sensor.b", "media_player.tv"]
        );
        assert!(room.watches(&id("media_player.tv")));
        assert!(!room.watches(&id("light.kitchen")));
    }

    #[test]
    fn should_never_treat_unknown_as_active() {
        let room = RoomConfig::builder()
            .trigger_entity(id("binary_sensor.motion"))
            .active_value("unknown")
            .active_value("on")
            .build()
            .unwrap();
        assert!(!room.is_active(&StateValue::from("unknown")));
        assert!(room.is_active(&StateValue::from("on")));
    }

    #[test]
    fn should_mirror_configuration_in_attributes() {
        let attrs = living_room().attributes();
        assert_eq!(
            attrs.get("room_name"),
            Some(&AttributeValue::String("Living Room".to_string()))
        );
        assert_eq!(attrs.get("timeout"), Some(&AttributeValue::Int(120)));
        assert_eq!(
            attrs.get("entities_toggle"),
            Some(&AttributeValue::Json(serde_json::json!([
                "binary_sensor.motion"
            ])))
        );
        assert_eq!(
            attrs.get("active_states"),
            Some(&AttributeValue::Json(serde_json::json!(["on", "playing"])))
        );
    }
}
