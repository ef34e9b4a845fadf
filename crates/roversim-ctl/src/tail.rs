//! Follow a channel and print new events as they arrive.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat};
use roversim_core::shutdown::Shutdown;
use roversim_core::transport::EventLog;
use roversim_types::{EventId, LogEvent};

use crate::error::CtlError;

/// Longest single blocking read while tailing.
const TAIL_BLOCK: Duration = Duration::from_secs(1);

/// Render one event as a single line: id, wall-clock time, then fields.
pub fn format_event(event: &LogEvent) -> String {
    let when = i64::try_from(event.id.millis)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map_or_else(
            || "-".to_owned(),
            |at| at.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
    let fields: Vec<String> = event
        .fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    format!("{} {when} {}", event.id, fields.join(" "))
}

/// Print every event appended to `channel` after its current tail, until
/// `shutdown` is requested.
///
/// # Errors
///
/// Returns [`CtlError::EmptyChannel`] if the channel has no events, or
/// [`CtlError::Transport`] if a read fails.
pub async fn follow<L: EventLog>(
    log: &L,
    channel: &str,
    shutdown: &Shutdown,
    mut emit: impl FnMut(&LogEvent),
) -> Result<u64, CtlError> {
    let mut cursor = log.tail(channel).await?;
    if cursor == EventId::ZERO {
        return Err(CtlError::EmptyChannel {
            channel: channel.to_owned(),
        });
    }
    tracing::info!(channel, cursor = %cursor, "Tailing channel");

    let mut printed: u64 = 0;
    while !shutdown.is_requested() {
        let cursors = [(channel.to_owned(), cursor)];
        let batch = tokio::select! {
            () = shutdown.wait() => break,
            batch = log.read(&cursors, 100, TAIL_BLOCK) => batch?,
        };
        for event in batch {
            cursor = cursor.max(event.id);
            emit(&event);
            printed = printed.saturating_add(1);
        }
    }
    Ok(printed)
}
