//! Persistence adapter trait and in-memory implementation.
//!
//! The world writes through a [`StateStore`] on every pose mutation and
//! after every tick; the event pipeline commits stream cursors through the
//! same store. The storage technology is external: `roversim-db` provides a
//! Dragonfly-backed implementation, and [`MemoryStore`] serves tests and
//! offline runs.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use roversim_types::{EntityId, EventId, Pose};
use tokio::sync::Mutex;

/// Errors raised by a [`StateStore`].
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The backing store rejected or failed the operation.
    #[error("persistence backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// A stored value exists but cannot be decoded.
    #[error("corrupt value at {key}: {reason}")]
    Corrupt {
        /// Key holding the bad value.
        key: String,
        /// Why decoding failed.
        reason: String,
    },
}

/// Durable storage for entity poses, simulated time, and stream cursors.
///
/// Writes must be durable when the returned future resolves. Concurrent
/// writers to the same key are arbitrated by the store (last writer wins).
pub trait StateStore: Send + Sync {
    /// Load the last persisted pose of an entity, if any.
    fn load_pose(
        &self,
        id: &EntityId,
    ) -> impl Future<Output = Result<Option<Pose>, PersistError>> + Send;

    /// Persist the pose of an entity.
    fn save_pose(
        &self,
        id: &EntityId,
        pose: Pose,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Load the last persisted simulated time, if any.
    fn load_simulated_time(&self) -> impl Future<Output = Result<Option<f64>, PersistError>> + Send;

    /// Persist the simulated time.
    fn save_simulated_time(&self, ts: f64) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Load the committed cursor of a channel, if any.
    fn load_cursor(
        &self,
        channel: &str,
    ) -> impl Future<Output = Result<Option<EventId>, PersistError>> + Send;

    /// Commit the cursor of a channel.
    fn save_cursor(
        &self,
        channel: &str,
        id: EventId,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;
}

#[derive(Debug, Default)]
struct MemoryState {
    poses: BTreeMap<EntityId, Pose>,
    simulated_time: Option<f64>,
    cursors: BTreeMap<String, EventId>,
}

/// A [`StateStore`] held in process memory.
///
/// Clones share the same state, so a "restarted" component can be handed
/// a clone to observe what the previous one persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_writes: Arc<AtomicBool>,
    fail_next_cursor: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`PersistError::Backend`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Make the next cursor commit fail with [`PersistError::Backend`].
    /// Later commits succeed again.
    pub fn fail_next_cursor_write(&self) {
        self.fail_next_cursor.store(true, Ordering::Release);
    }

    fn check_writable(&self) -> Result<(), PersistError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(PersistError::Backend {
                message: "memory store is read-only".to_owned(),
            });
        }
        Ok(())
    }
}

impl StateStore for MemoryStore {
    async fn load_pose(&self, id: &EntityId) -> Result<Option<Pose>, PersistError> {
        Ok(self.state.lock().await.poses.get(id).copied())
    }

    async fn save_pose(&self, id: &EntityId, pose: Pose) -> Result<(), PersistError> {
        self.check_writable()?;
        self.state.lock().await.poses.insert(id.clone(), pose);
        Ok(())
    }

    async fn load_simulated_time(&self) -> Result<Option<f64>, PersistError> {
        Ok(self.state.lock().await.simulated_time)
    }

    async fn save_simulated_time(&self, ts: f64) -> Result<(), PersistError> {
        self.check_writable()?;
        self.state.lock().await.simulated_time = Some(ts);
        Ok(())
    }

    async fn load_cursor(&self, channel: &str) -> Result<Option<EventId>, PersistError> {
        Ok(self.state.lock().await.cursors.get(channel).copied())
    }

    async fn save_cursor(&self, channel: &str, id: EventId) -> Result<(), PersistError> {
        self.check_writable()?;
        if self.fail_next_cursor.swap(false, Ordering::AcqRel) {
            return Err(PersistError::Backend {
                message: format!("cursor commit for {channel} refused"),
            });
        }
        self.state
            .lock()
            .await
            .cursors
            .insert(channel.to_owned(), id);
        Ok(())
    }
}
