//! Redis stream operations backing the [`EventLog`] trait.
//!
//! Channels map one-to-one onto stream keys, unprefixed, so external
//! producers and consumers can use the same names. Stream entry ids
//! (`<millis>-<seq>`) are parsed into [`EventId`]s.
//!
//! A blocking `XREAD` occupies its connection until it returns, so the
//! engine gives the event log a pool of its own.

use std::collections::HashMap;
use std::time::Duration;

use fred::prelude::*;
use roversim_core::transport::{EventLog, TransportError};
use roversim_types::{EventId, Fields, LogEvent};

use crate::dragonfly::DragonflyPool;
use crate::error::DbError;

/// One stream entry as returned by `fred`: id and field map.
type RawEntry = (String, HashMap<String, String>);

fn parse_id(channel: &str, raw: &str) -> Result<EventId, DbError> {
    raw.parse().map_err(|e: roversim_types::EventIdError| DbError::Corrupt {
        key: channel.to_owned(),
        reason: e.to_string(),
    })
}

fn to_event(channel: &str, (id, fields): RawEntry) -> Result<LogEvent, DbError> {
    Ok(LogEvent {
        channel: channel.to_owned(),
        id: parse_id(channel, &id)?,
        fields: fields.into_iter().collect(),
    })
}

/// `BLOCK` argument for a wait of `block`.
///
/// `BLOCK 0` means wait forever, so a zero wait omits the argument and
/// sub-millisecond waits round up to one millisecond.
fn block_millis(block: Duration) -> Option<u64> {
    if block.is_zero() {
        return None;
    }
    Some(u64::try_from(block.as_millis()).unwrap_or(u64::MAX).max(1))
}

impl DragonflyPool {
    /// Id of the newest entry in the stream at `channel`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    /// Returns [`DbError::Corrupt`] if the id cannot be parsed.
    pub async fn stream_tail(&self, channel: &str) -> Result<Option<EventId>, DbError> {
        let newest: Vec<RawEntry> = self
            .client()
            .xrevrange_values(channel, "+", "-", Some(1))
            .await?;
        newest
            .first()
            .map(|(id, _)| parse_id(channel, id))
            .transpose()
    }

    /// Append an entry to the stream at `channel` with a server-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the write fails.
    /// Returns [`DbError::Corrupt`] if the returned id cannot be parsed.
    pub async fn stream_append(&self, channel: &str, fields: &Fields) -> Result<EventId, DbError> {
        let mut args: Vec<String> = Vec::with_capacity(fields.len().saturating_mul(2).saturating_add(2));
        args.push(channel.to_owned());
        args.push("*".to_owned());
        for (field, value) in fields {
            args.push(field.clone());
            args.push(value.clone());
        }
        let id: String = self.client().custom(fred::cmd!("XADD"), args).await?;
        parse_id(channel, &id)
    }

    /// Read entries newer than each channel's cursor, waiting up to `block`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    /// Returns [`DbError::Corrupt`] if an entry id cannot be parsed.
    pub async fn stream_read(
        &self,
        cursors: &[(String, EventId)],
        count: u64,
        block: Duration,
    ) -> Result<Vec<LogEvent>, DbError> {
        if cursors.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = cursors.iter().map(|(channel, _)| channel.clone()).collect();
        let ids: Vec<String> = cursors.iter().map(|(_, id)| id.to_string()).collect();

        let response: HashMap<String, Vec<RawEntry>> = self
            .client()
            .xread_map(Some(count), block_millis(block), keys, ids)
            .await?;

        let mut events = Vec::new();
        for (channel, entries) in response {
            for entry in entries {
                events.push(to_event(&channel, entry)?);
            }
        }
        events.sort_by(|a, b| a.channel.cmp(&b.channel).then(a.id.cmp(&b.id)));
        Ok(events)
    }
}

impl EventLog for DragonflyPool {
    async fn tail(&self, channel: &str) -> Result<EventId, TransportError> {
        Ok(self.stream_tail(channel).await?.unwrap_or(EventId::ZERO))
    }

    async fn read(
        &self,
        cursors: &[(String, EventId)],
        count: u64,
        block: Duration,
    ) -> Result<Vec<LogEvent>, TransportError> {
        Ok(self.stream_read(cursors, count, block).await?)
    }

    async fn append(&self, channel: &str, fields: &Fields) -> Result<EventId, TransportError> {
        Ok(self.stream_append(channel, fields).await?)
    }
}
