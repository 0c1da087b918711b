//! The occupancy rule.
//!
//! Entering occupancy needs a direct trigger; staying occupied accepts any
//! trigger *or* keep entity. Ambient keep-alive sensors alone can therefore
//! never mark an empty room as occupied.

use std::collections::{BTreeMap, HashMap};

use crate::entity::StateValue;
use crate::id::EntityId;
use crate::occupancy::OccupancyState;
use crate::room::RoomConfig;

/// Read-only view of current entity values, supplied per evaluation.
pub trait Snapshot {
    /// Current value of `entity_id`, or `None` when missing or unknown.
    fn value(&self, entity_id: &EntityId) -> Option<&StateValue>;
}

impl Snapshot for HashMap<EntityId, StateValue> {
    fn value(&self, entity_id: &EntityId) -> Option<&StateValue> {
        self.get(entity_id)
    }
}

impl Snapshot for BTreeMap<EntityId, StateValue> {
    fn value(&self, entity_id: &EntityId) -> Option<&StateValue> {
        self.get(entity_id)
    }
}

/// Compute whether the room should be occupied.
///
/// Missing and unknown values count as inactive; this never fails.
#[must_use]
pub fn evaluate(config: &RoomConfig, current: OccupancyState, snapshot: &impl Snapshot) -> bool {
    let is_active = |id: &EntityId| snapshot.value(id).is_some_and(|v| config.is_active(v));

    match current {
        OccupancyState::Unoccupied => config.trigger_entities().iter().any(is_active),
        OccupancyState::Occupied => config
            .trigger_entities()
            .iter()
            .chain(config.keep_entities())
            .any(is_active),
    }
}
