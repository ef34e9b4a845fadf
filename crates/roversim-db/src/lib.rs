//! Data layer for the rover simulation (`Dragonfly`).
//!
//! `Dragonfly` holds both halves of the simulator's external state: the
//! persisted world (entity poses, simulated time, committed cursors) and
//! the event streams the pipeline consumes and produces. [`DragonflyPool`]
//! implements the core [`StateStore`] and [`EventLog`] traits over them.
//!
//! ```text
//! EventPipeline
//!     |
//!     +-- StateStore --> {prefix}:entity:{id}:pose, {prefix}:ts, {prefix}:cursor:{channel}
//!     |
//!     +-- EventLog ----> XREAD / XADD / XREVRANGE on the configured channels
//! ```
//!
//! # Modules
//!
//! - [`dragonfly`] -- Connection handle and state keys
//! - [`streams`] -- Stream reads and appends
//! - [`error`] -- Shared error types
//!
//! [`StateStore`]: roversim_core::store::StateStore
//! [`EventLog`]: roversim_core::transport::EventLog

pub mod dragonfly;
pub mod error;
pub mod streams;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyPool;
pub use error::DbError;
