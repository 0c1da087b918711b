//! Host state ports — read entity values, publish derived room states.

use std::future::Future;

use roomsense_domain::entity::{Attributes, StateValue};
use roomsense_domain::error::RoomSenseError;
use roomsense_domain::id::EntityId;
use roomsense_domain::occupancy::OccupancyState;

/// Read access to the host's current entity values.
pub trait StateReader {
    /// Current value of `entity_id`.
    ///
    /// Returns `Ok(None)` when the entity is missing or its value is unknown.
    fn get(
        &self,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<Option<StateValue>, RoomSenseError>> + Send;
}

/// Write access for a room's derived state.
pub trait StatePublisher {
    /// Publish `state` under `entity_id` together with `attributes`.
    fn publish(
        &self,
        entity_id: &EntityId,
        state: OccupancyState,
        attributes: Attributes,
    ) -> impl Future<Output = Result<(), RoomSenseError>> + Send;
}

impl<T: StateReader + Send + Sync> StateReader for std::sync::Arc<T> {
    fn get(
        &self,
        entity_id: &EntityId,
    ) -> impl Future<Output = Result<Option<StateValue>, RoomSenseError>> + Send {
        (**self).get(entity_id)
    }
}

impl<T: StatePublisher + Send + Sync> StatePublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        entity_id: &EntityId,
        state: OccupancyState,
        attributes: Attributes,
    ) -> impl Future<Output = Result<(), RoomSenseError>> + Send {
        (**self).publish(entity_id, state, attributes)
    }
}
