//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and the event loop.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: roversim_core::config::ConfigError,
    },

    /// Connecting to Dragonfly failed.
    #[error("Dragonfly unavailable at {url}: {source}")]
    Connect {
        /// URL that was tried.
        url: String,
        /// The underlying data-layer error.
        source: roversim_db::DbError,
    },

    /// Building or restoring the world failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: roversim_core::world::WorldError,
    },

    /// The event pipeline failed.
    #[error("pipeline error: {source}")]
    Pipeline {
        /// The underlying pipeline error.
        #[from]
        source: roversim_core::pipeline::PipelineError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_error_names_the_url() {
        let err = EngineError::Connect {
            url: "redis://nowhere:6379".to_owned(),
            source: roversim_db::DbError::Config("refused".to_owned()),
        };
        let message = err.to_string();
        assert!(message.contains("redis://nowhere:6379"));
        assert!(message.contains("refused"));
    }
}
