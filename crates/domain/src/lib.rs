//! # roomsense-domain
//!
//! Pure domain model for roomsense, a room-occupancy aggregator.
//!
//! ## Responsibilities
//! - Foundational types: entity identifiers, error conventions, timestamps
//! - Define **entity values** (the raw state a host reports for a sensor)
//! - Define **rooms** (which sensors toggle occupancy, which keep it alive)
//! - Define the **occupancy rule** (the two-tier evaluator)
//! - Define **state changes** (notifications flowing from the host)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod entity;
pub mod evaluator;
pub mod event;
pub mod occupancy;
pub mod room;
