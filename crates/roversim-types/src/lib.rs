//! Shared type definitions for the rover simulation.
//!
//! This crate is the single source of truth for the values that cross
//! crate boundaries: geometry, identifiers, and event-log messages.
//!
//! # Modules
//!
//! - [`geometry`] -- Immutable [`Point`] and [`Pose`] with angle normalization
//! - [`ids`] -- [`EntityId`] and stream [`EventId`]
//! - [`messages`] -- Flat field encodings for motor, command, telemetry,
//!   and result events

pub mod geometry;
pub mod ids;
pub mod messages;

// Re-export all public types at crate root for convenience.
pub use geometry::{Point, Pose, angular_distance, normalize_angle};
pub use ids::{EntityId, EventId, EventIdError};
pub use messages::{
    CommandMessage, CommandOutcome, CommandResult, Fields, LogEvent, MessageError, MotorPower,
    Telemetry,
};
