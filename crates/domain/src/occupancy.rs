//! Derived occupancy state of a room.

use serde::{Deserialize, Serialize};

use crate::entity::StateValue;

/// Two-valued derived state. Hosts see it as a binary sensor (`on` / `off`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OccupancyState {
    #[serde(rename = "on")]
    Occupied,
    #[default]
    #[serde(rename = "off")]
    Unoccupied,
}

impl OccupancyState {
    #[must_use]
    pub fn is_occupied(self) -> bool {
        matches!(self, Self::Occupied)
    }

    /// The value written to the host's state store.
    #[must_use]
    pub fn as_state_value(self) -> StateValue {
        StateValue::String(self.to_string())
    }
}

impl From<bool> for OccupancyState {
    fn from(occupied: bool) -> Self {
        if occupied {
            Self::Occupied
        } else {
            Self::Unoccupied
        }
    }
}

impl std::fmt::Display for OccupancyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Occupied => f.write_str("on"),
            Self::Unoccupied => f.write_str("off"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_unoccupied() {
        assert_eq!(OccupancyState::default(), OccupancyState::Unoccupied);
    }

    #[test]
    fn should_convert_from_bool() {
        assert_eq!(OccupancyState::from(true), OccupancyState::Occupied);
        assert_eq!(OccupancyState::from(false), OccupancyState::Unoccupied);
    }

    #[test]
    fn should_encode_as_binary_sensor_state() {
        assert_eq!(OccupancyState::Occupied.to_string(), "on");
        assert_eq!(
            OccupancyState::Unoccupied.as_state_value(),
            StateValue::from("off")
        );
        assert_eq!(
            serde_json::to_string(&OccupancyState::Occupied).unwrap(),
            "\"on\""
        );
    }
}
