//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the host
//! platform. Rooms only ever see the host through these traits, so the
//! watcher can be driven by the in-memory store in tests and by a real
//! bridge in production.

pub mod event_bus;
pub mod state;

pub use event_bus::EventPublisher;
pub use state::{StatePublisher, StateReader};
