//! State-change notifications flowing from the host to the rooms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::StateValue;
use crate::id::EntityId;

/// UTC timestamp attached to state changes.
pub type Timestamp = DateTime<Utc>;

/// An entity's value changed (or was reported again with new attributes).
///
/// `None` stands for a missing or unknown value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub entity_id: EntityId,
    pub from: Option<StateValue>,
    pub to: Option<StateValue>,
    pub timestamp: Timestamp,
}

impl StateChange {
    /// Create a notification stamped with the current time.
    #[must_use]
    pub fn new(entity_id: EntityId, from: Option<StateValue>, to: Option<StateValue>) -> Self {
        Self {
            entity_id,
            from,
            to,
            timestamp: Utc::now(),
        }
    }

    /// Whether the value itself changed, as opposed to a re-report.
    #[must_use]
    pub fn is_value_change(&self) -> bool {
        self.from != self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion() -> EntityId {
        "binary_sensor.motion".parse().unwrap()
    }

    #[test]
    fn should_stamp_with_current_time() {
        let before = Utc::now();
        let change = StateChange::new(motion(), None, Some("on".into()));
        assert!(change.timestamp >= before);
        assert!(change.timestamp <= Utc::now());
    }

    #[test]
    fn should_detect_value_change() {
        let change = StateChange::new(motion(), Some("off".into()), Some("on".into()));
        assert!(change.is_value_change());

        let repeat = StateChange::new(motion(), Some("on".into()), Some("on".into()));
        assert!(!repeat.is_value_change());
    }

    #[test]
    fn should_serialize_unknown_as_null() {
        let change = StateChange::new(motion(), Some("on".into()), None);
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["entity_id"], "binary_sensor.motion");
        assert_eq!(json["from"], "on");
        assert!(json["to"].is_null());
    }
}
