//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`RoomSenseError`] via `#[from]` when crossing a port boundary.

/// Top-level error shared by every port.
#[derive(Debug, thiserror::Error)]
pub enum RoomSenseError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// An adapter (MQTT client, host bridge, …) failed.
    #[error("adapter error")]
    Adapter(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Invariant violations detected while building domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("timeout must not exceed {0} seconds")]
    TimeoutTooLong(u64),

    #[error("at least one trigger entity is required")]
    NoTriggerEntities,

    #[error("invalid entity id {0:?}, expected <domain>.<object_id>")]
    InvalidEntityId(String),

    #[error("room {0} is already registered")]
    DuplicateRoom(String),
}

/// A lookup for something that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}
