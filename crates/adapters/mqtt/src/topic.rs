//! Topic layout shared with the host's state stream.
//!
//! Entity states live under `<base>/<domain>/<object_id>/state` and
//! attributes under `<base>/<domain>/<object_id>/attributes`.

use roomsense_domain::id::EntityId;

const STATE_SUFFIX: &str = "state";
const ATTRIBUTES_SUFFIX: &str = "attributes";

/// Builds and parses topics below one base prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
}

impl Topics {
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn state(&self, entity_id: &EntityId) -> String {
        self.topic(entity_id, STATE_SUFFIX)
    }

    #[must_use]
    pub fn attributes(&self, entity_id: &EntityId) -> String {
        self.topic(entity_id, ATTRIBUTES_SUFFIX)
    }

    /// Entity whose state is carried on `topic`, if it is a state topic
    /// below this base.
    #[must_use]
    pub fn parse_state(&self, topic: &str) -> Option<EntityId> {
        let rest = topic.strip_prefix(&self.base)?.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let (domain, object_id, suffix) = (parts.next()?, parts.next()?, parts.next()?);
        if suffix != STATE_SUFFIX || parts.next().is_some() {
            return None;
        }
        EntityId::new(domain, object_id).ok()
    }

    fn topic(&self, entity_id: &EntityId, suffix: &str) -> String {
        format!(
            "{}/{}/{}/{suffix}",
            self.base,
            entity_id.domain(),
            entity_id.object_id()
        )
    }
}
