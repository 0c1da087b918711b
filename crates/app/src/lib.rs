//! # roomsense-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** the host side must implement:
//!   - `StateReader` — current value of an entity
//!   - `StatePublisher` — publish a room's derived state and attributes
//!   - `EventPublisher` — broadcast state-change notifications
//! - Provide **in-process infrastructure** that doesn't need IO
//!   (event bus, in-memory state store)
//! - Run each room as a single-threaded watcher:
//!   notification → evaluator → timeout controller → publish
//! - Keep the registry of running rooms (`RoomService`)
//!
//! ## Dependency rule
//! Depends on `roomsense-domain` only (plus `tokio` for channels, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod ports;
pub mod room_watcher;
pub mod services;
pub mod state_store;
pub mod timeout_controller;
