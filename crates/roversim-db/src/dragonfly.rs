//! `Dragonfly` (Redis-compatible) state operations.
//!
//! Entity poses, the simulated clock, and committed stream cursors live in
//! plain string keys under a configurable prefix. [`DragonflyPool`]
//! implements [`StateStore`] over them.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `{prefix}:entity:{id}:pose` | JSON | `{x, y, heading}` of an entity |
//! | `{prefix}:ts` | Float | Last simulated time in seconds |
//! | `{prefix}:cursor:{channel}` | String | Last consumed event id |

use fred::prelude::*;
use roversim_core::store::{PersistError, StateStore};
use roversim_types::{EntityId, EventId, Pose};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DbError;

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`] and provides typed operations for the
/// key patterns above. Clones share the connection.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
    prefix: String,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL, namespacing state keys
    /// under `prefix`.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!(prefix, "Connected to Dragonfly");
        Ok(Self {
            client,
            prefix: prefix.to_owned(),
        })
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Key holding an entity's pose.
    pub fn pose_key(&self, id: &EntityId) -> String {
        format!("{}:entity:{id}:pose", self.prefix)
    }

    /// Key holding the simulated time.
    pub fn time_key(&self) -> String {
        format!("{}:ts", self.prefix)
    }

    /// Key holding a channel's committed cursor.
    pub fn cursor_key(&self, channel: &str) -> String {
        format!("{}:cursor:{channel}", self.prefix)
    }

    // =========================================================================
    // Generic get/set/delete
    // =========================================================================

    /// Store a plain string at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_string(&self, key: &str, value: &str) -> Result<(), DbError> {
        let _: () = self.client.set(key, value, None, None, false).await?;
        Ok(())
    }

    /// Read the string at `key`, `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn get_string(&self, key: &str) -> Result<Option<String>, DbError> {
        Ok(self.client.get(key).await?)
    }

    /// Serialize `value` as JSON and store it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if serialization fails.
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        self.set_string(key, &json).await
    }

    /// Read the value at `key` and deserialize it from JSON.
    ///
    /// Returns `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Corrupt`] if deserialization fails.
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        self.get_string(key)
            .await?
            .map(|s| {
                serde_json::from_str(&s).map_err(|e| DbError::Corrupt {
                    key: key.to_owned(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// Delete a key from `Dragonfly`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), DbError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }

    async fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, DbError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_string(key)
            .await?
            .map(|s| {
                s.trim().parse().map_err(|e: T::Err| DbError::Corrupt {
                    key: key.to_owned(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

impl std::fmt::Debug for DragonflyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragonflyPool")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl StateStore for DragonflyPool {
    async fn load_pose(&self, id: &EntityId) -> Result<Option<Pose>, PersistError> {
        Ok(self.get_json(&self.pose_key(id)).await?)
    }

    async fn save_pose(&self, id: &EntityId, pose: Pose) -> Result<(), PersistError> {
        Ok(self.set_json(&self.pose_key(id), &pose).await?)
    }

    async fn load_simulated_time(&self) -> Result<Option<f64>, PersistError> {
        Ok(self.get_parsed(&self.time_key()).await?)
    }

    async fn save_simulated_time(&self, ts: f64) -> Result<(), PersistError> {
        Ok(self.set_string(&self.time_key(), &ts.to_string()).await?)
    }

    async fn load_cursor(&self, channel: &str) -> Result<Option<EventId>, PersistError> {
        Ok(self.get_parsed(&self.cursor_key(channel)).await?)
    }

    async fn save_cursor(&self, channel: &str, id: EventId) -> Result<(), PersistError> {
        Ok(self
            .set_string(&self.cursor_key(channel), &id.to_string())
            .await?)
    }
}
