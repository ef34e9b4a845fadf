//! Event-log transport trait and in-memory implementation.
//!
//! The transport is an append-only, per-channel ordered log. Each event
//! carries a monotonically increasing [`EventId`] and a flat field set.
//! Consumers track their own cursors and read strictly after them.
//!
//! `roversim-db` implements [`EventLog`] over Redis-compatible streams;
//! [`MemoryLog`] serves tests and local tooling.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use roversim_types::{EventId, Fields, LogEvent};
use tokio::sync::{Mutex, Notify};

/// Errors raised by an [`EventLog`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The log cannot be reached.
    #[error("transport unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The log returned data that does not follow the event format.
    #[error("malformed transport data: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },
}

/// An ordered, persisted, multi-consumer event log.
pub trait EventLog: Send + Sync {
    /// Id of the newest event in `channel`, or [`EventId::ZERO`] when the
    /// channel is empty or does not exist.
    fn tail(&self, channel: &str) -> impl Future<Output = Result<EventId, TransportError>> + Send;

    /// Read up to `count` events per channel with ids strictly greater than
    /// the paired cursor.
    ///
    /// Waits up to `block` for at least one event and returns an empty
    /// batch on timeout. A zero `block` never waits. Events of one channel
    /// are returned in id order.
    fn read(
        &self,
        cursors: &[(String, EventId)],
        count: u64,
        block: Duration,
    ) -> impl Future<Output = Result<Vec<LogEvent>, TransportError>> + Send;

    /// Append an event to `channel` and return its id.
    fn append(
        &self,
        channel: &str,
        fields: &Fields,
    ) -> impl Future<Output = Result<EventId, TransportError>> + Send;
}

#[derive(Debug, Default)]
struct MemoryChannels {
    channels: BTreeMap<String, Vec<(EventId, Fields)>>,
    last_id: EventId,
}

/// An [`EventLog`] held in process memory.
///
/// Ids are allocated from a single counter, so they increase across all
/// channels. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    inner: Arc<Mutex<MemoryChannels>>,
    appended: Arc<Notify>,
}

impl MemoryLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event currently in `channel`, oldest first.
    pub async fn events(&self, channel: &str) -> Vec<LogEvent> {
        self.inner
            .lock()
            .await
            .channels
            .get(channel)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(id, fields)| LogEvent {
                        channel: channel.to_owned(),
                        id: *id,
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn collect(&self, cursors: &[(String, EventId)], count: u64) -> Vec<LogEvent> {
        let limit = usize::try_from(count).unwrap_or(usize::MAX);
        let guard = self.inner.lock().await;
        let mut batch = Vec::new();
        for (channel, cursor) in cursors {
            let Some(entries) = guard.channels.get(channel) else {
                continue;
            };
            batch.extend(
                entries
                    .iter()
                    .filter(|(id, _)| id > cursor)
                    .take(limit)
                    .map(|(id, fields)| LogEvent {
                        channel: channel.clone(),
                        id: *id,
                        fields: fields.clone(),
                    }),
            );
        }
        batch
    }
}

impl EventLog for MemoryLog {
    async fn tail(&self, channel: &str) -> Result<EventId, TransportError> {
        Ok(self
            .inner
            .lock()
            .await
            .channels
            .get(channel)
            .and_then(|entries| entries.last())
            .map_or(EventId::ZERO, |(id, _)| *id))
    }

    async fn read(
        &self,
        cursors: &[(String, EventId)],
        count: u64,
        block: Duration,
    ) -> Result<Vec<LogEvent>, TransportError> {
        let started = tokio::time::Instant::now();
        loop {
            // Register interest before checking so an append between the
            // check and the wait is not missed.
            let appended = self.appended.notified();
            let batch = self.collect(cursors, count).await;
            let remaining = block.saturating_sub(started.elapsed());
            if !batch.is_empty() || remaining.is_zero() {
                return Ok(batch);
            }
            if tokio::time::timeout(remaining, appended).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn append(&self, channel: &str, fields: &Fields) -> Result<EventId, TransportError> {
        let id = {
            let mut guard = self.inner.lock().await;
            let id = guard.last_id.successor();
            guard.last_id = id;
            guard
                .channels
                .entry(channel.to_owned())
                .or_default()
                .push((id, fields.clone()));
            id
        };
        self.appended.notify_waiters();
        Ok(id)
    }
}
