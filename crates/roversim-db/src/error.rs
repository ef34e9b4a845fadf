//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`fred`] and [`serde_json`] errors. At the crate boundary they are
//! converted into the core [`PersistError`] and [`TransportError`] so the
//! world and pipeline stay storage-agnostic.

use roversim_core::store::PersistError;
use roversim_core::transport::TransportError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value exists but cannot be interpreted.
    #[error("Corrupt value at {key}: {reason}")]
    Corrupt {
        /// Key holding the value.
        key: String,
        /// Why it could not be interpreted.
        reason: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for PersistError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Corrupt { key, reason } => Self::Corrupt { key, reason },
            DbError::Serialization(source) => Self::Corrupt {
                key: String::new(),
                reason: source.to_string(),
            },
            DbError::Dragonfly(_) | DbError::Config(_) => Self::Backend {
                message: err.to_string(),
            },
        }
    }
}

impl From<DbError> for TransportError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Corrupt { .. } | DbError::Serialization(_) => Self::Malformed {
                message: err.to_string(),
            },
            DbError::Dragonfly(_) | DbError::Config(_) => Self::Unavailable {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_values_keep_their_key() {
        let err = DbError::Corrupt {
            key: "roversim:ts".to_owned(),
            reason: "not a number".to_owned(),
        };
        assert!(matches!(
            PersistError::from(err),
            PersistError::Corrupt { ref key, .. } if key == "roversim:ts"
        ));
    }

    #[test]
    fn config_errors_are_unavailable_transport() {
        let err = TransportError::from(DbError::Config("bad url".to_owned()));
        assert!(matches!(err, TransportError::Unavailable { .. }));
    }
}
