//! Simulation core for a two-wheeled differential-drive rover.
//!
//! This crate owns everything between the wire and the store: motion
//! math, the entity model, the world and its clock, the text command
//! protocol, and the event pipeline that ties them to an event log.
//!
//! # Modules
//!
//! - [`kinematics`] -- Arc-approximation motion model.
//! - [`entity`] -- Motors, compasses, and rovers as a closed [`Entity`] enum.
//! - [`world`] -- Entity registry and pose table with write-through
//!   persistence.
//! - [`clock`] -- Simulated time with wall-clock catch-up and the
//!   fixed-step driver.
//! - [`command`] -- Text command parsing into motor intents.
//! - [`config`] -- Configuration loading from `roversim-config.yaml`.
//! - [`store`] -- [`StateStore`] trait and [`MemoryStore`].
//! - [`transport`] -- [`EventLog`] trait and [`MemoryLog`].
//! - [`pipeline`] -- The per-rover event loop.
//! - [`shutdown`] -- Cooperative stop signal.
//!
//! [`Entity`]: entity::Entity
//! [`StateStore`]: store::StateStore
//! [`MemoryStore`]: store::MemoryStore
//! [`EventLog`]: transport::EventLog
//! [`MemoryLog`]: transport::MemoryLog

pub mod clock;
pub mod command;
pub mod config;
pub mod entity;
pub mod kinematics;
pub mod pipeline;
pub mod shutdown;
pub mod store;
pub mod transport;
pub mod world;
