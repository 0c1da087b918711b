//! Host-style entity identifiers (`<domain>.<object_id>`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of an entity on the host platform, e.g. `binary_sensor.hall_motion`.
///
/// Both halves must be non-empty and made of lowercase ASCII letters,
/// digits and underscores.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Build an id from its two halves.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidEntityId`] if either half is malformed.
    pub fn new(domain: &str, object_id: &str) -> Result<Self, ValidationError> {
        format!("{domain}.{object_id}").parse()
    }

    /// The part before the dot (`binary_sensor`, `media_player`, …).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.split().0
    }

    /// The part after the dot.
    #[must_use]
    pub fn object_id(&self) -> &str {
        self.split().1
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> (&str, &str) {
        // validated on construction
        self.0.split_once('.').unwrap_or((&self.0, ""))
    }
}

fn is_valid_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

impl FromStr for EntityId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if is_valid_part(domain) && is_valid_part(object_id) => {
                Ok(Self(s.to_string()))
            }
            _ => Err(ValidationError::InvalidEntityId(s.to_string())),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turn a free-form name into a valid `object_id` (`"Living Room"` → `living_room`).
///
/// Returns an empty string when the name has no ASCII alphanumerics.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_well_formed_id() {
        let id: EntityId = "binary_sensor.hall_motion".parse().unwrap();
        assert_eq!(id.domain(), "binary_sensor");
        assert_eq!(id.object_id(), "hall_motion");
        assert_eq!(id.to_string(), "binary_sensor.hall_motion");
    }

    #[test]
    fn should_reject_id_without_dot() {
        let result = EntityId::from_str("motion");
        assert_eq!(
            result,
            Err(ValidationError::InvalidEntityId("motion".to_string()))
        );
    }

    #[test]
    fn should_reject_id_with_empty_half() {
        assert!(EntityId::from_str(".motion").is_err());
        assert!(EntityId::from_str("sensor.").is_err());
    }

    #[test]
    fn should_reject_uppercase_and_spaces() {
        assert!(EntityId::from_str("sensor.Hall").is_err());
        assert!(EntityId::from_str("sensor.hall motion").is_err());
    }

    #[test]
    fn should_build_from_halves() {
        let id = EntityId::new("media_player", "tv").unwrap();
        assert_eq!(id.as_str(), "media_player.tv");
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let id: EntityId = "sensor.lux".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sensor.lux\"");
    }

    #[test]
    fn should_reject_invalid_id_when_deserializing() {
        let result: Result<EntityId, _> = serde_json::from_str("\"not valid\"");
        assert!(result.is_err());
    }

    #[test]
    fn should_slugify_room_names() {
        assert_eq!(slugify("Living Room"), "living_room");
        assert_eq!(slugify("  Kid's   Room 2 "), "kid_s_room_2");
        assert_eq!(slugify("***"), "");
    }
}
