//! Error types for the console binary.

use roversim_core::command::ProtocolError;
use roversim_core::transport::TransportError;
use roversim_core::world::WorldError;

/// Errors raised by console subcommands.
#[derive(Debug, thiserror::Error)]
pub enum CtlError {
    /// Reading standard input failed.
    #[error("input error: {0}")]
    Io(#[from] std::io::Error),

    /// The event log failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The offline world failed.
    #[error("world error: {0}")]
    World(#[from] WorldError),

    /// A command given on the command line is invalid.
    #[error("invalid command: {0}")]
    Protocol(#[from] ProtocolError),

    /// The channel to tail has no events.
    #[error("channel {channel} is empty")]
    EmptyChannel {
        /// Channel that was requested.
        channel: String,
    },
}
