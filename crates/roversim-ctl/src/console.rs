//! Interactive command console.
//!
//! `send` drives the motors directly: each command line becomes a pair of
//! motor power events, held for the command's duration and then zeroed.
//! `cmd` instead hands a single command to the engine over the command
//! channel and lets the engine do the timing.

use roversim_core::command::Command;
use roversim_core::config::StreamsConfig;
use roversim_core::transport::EventLog;
use roversim_types::{CommandMessage, EventId, MotorPower};
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt as _;
use tracing::{debug, info, warn};

use crate::error::CtlError;

/// Word that ends an interactive session.
pub const QUIT: &str = "quit";

/// What an interactive session did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Commands executed.
    pub executed: u64,
    /// Lines rejected as invalid commands.
    pub rejected: u64,
}

/// Read commands from `input` until end of input or `quit`, driving the
/// motor channels for each.
///
/// # Errors
///
/// Returns [`CtlError::Io`] if reading fails or [`CtlError::Transport`]
/// if an append fails. Invalid commands are reported and skipped.
pub async fn run_session<L, R>(
    log: &L,
    streams: &StreamsConfig,
    input: R,
) -> Result<SessionSummary, CtlError>
where
    L: EventLog,
    R: AsyncBufRead + Unpin,
{
    let mut summary = SessionSummary::default();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case(QUIT) {
            info!("Session ended by operator");
            break;
        }
        match Command::parse(text) {
            Ok(command) => {
                drive(log, streams, command).await?;
                summary.executed = summary.executed.saturating_add(1);
            }
            Err(err) => {
                summary.rejected = summary.rejected.saturating_add(1);
                warn!(input = text, error = %err, "Invalid command");
            }
        }
    }
    Ok(summary)
}

/// Set both motors for `command`, wait its hold, then zero them.
///
/// `noop` sends nothing.
///
/// # Errors
///
/// Returns [`CtlError::Transport`] if an append fails.
pub async fn drive<L: EventLog>(
    log: &L,
    streams: &StreamsConfig,
    command: Command,
) -> Result<(), CtlError> {
    let intent = command.intent();
    let Some((power_a, power_b)) = intent.powers else {
        debug!(command = %command, "Nothing to send");
        return Ok(());
    };

    set_motors(log, streams, power_a, power_b).await?;
    info!(
        command = %command,
        power_a,
        power_b,
        hold_ms = u64::try_from(intent.hold.as_millis()).unwrap_or(u64::MAX),
        "Motors set"
    );
    tokio::time::sleep(intent.hold).await;
    set_motors(log, streams, 0.0, 0.0).await?;
    debug!(command = %command, "Motors stopped");
    Ok(())
}

async fn set_motors<L: EventLog>(
    log: &L,
    streams: &StreamsConfig,
    power_a: f64,
    power_b: f64,
) -> Result<(), CtlError> {
    log.append(&streams.motor_a, &MotorPower { power: power_a }.to_fields())
        .await?;
    log.append(&streams.motor_b, &MotorPower { power: power_b }.to_fields())
        .await?;
    Ok(())
}

/// Build the command event for `text`, validating it first.
///
/// # Errors
///
/// Returns [`CtlError::Protocol`] if `text` is not a valid command.
pub fn command_message(text: &str, id: String) -> Result<CommandMessage, CtlError> {
    Command::parse(text)?;
    let text = text.trim();
    let (cmd, args) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    Ok(CommandMessage {
        id: Some(id),
        cmd: cmd.to_owned(),
        args: args.trim().to_owned(),
    })
}

/// Append one command event to the command channel.
///
/// # Errors
///
/// Returns [`CtlError::Transport`] if the append fails.
pub async fn send_command<L: EventLog>(
    log: &L,
    streams: &StreamsConfig,
    message: &CommandMessage,
) -> Result<EventId, CtlError> {
    let id = log.append(&streams.command, &message.to_fields()).await?;
    info!(event = %id, correlation = ?message.id, command = %message.text(), "Command queued");
    Ok(id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use roversim_core::transport::MemoryLog;

    use super::*;

    fn powers(events: &[roversim_types::LogEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| e.fields.get("power").cloned())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn session_drives_motors_until_quit() {
        let log = MemoryLog::new();
        let streams = StreamsConfig::default();
        let input: &[u8] = b"fwd 100\n\nbogus\nrt 50\nQUIT\nfwd 100\n";

        let summary = run_session(&log, &streams, input).await.unwrap();

        assert_eq!(
            summary,
            SessionSummary {
                executed: 2,
                rejected: 1
            }
        );
        assert_eq!(
            powers(&log.events(&streams.motor_a).await),
            ["0.8", "0", "0.8", "0"]
        );
        assert_eq!(
            powers(&log.events(&streams.motor_b).await),
            ["0.8", "0", "-0.8", "0"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn drive_waits_for_the_hold() {
        let log = MemoryLog::new();
        let streams = StreamsConfig::default();
        let start = tokio::time::Instant::now();
        drive(&log, &streams, Command::parse("fwd 200").unwrap())
            .await
            .unwrap();
        assert!(start.elapsed() >= std::time::Duration::from_secs(2));
    }

    #[tokio::test]
    async fn noop_sends_nothing() {
        let log = MemoryLog::new();
        let streams = StreamsConfig::default();
        drive(&log, &streams, Command::Noop).await.unwrap();
        assert!(log.events(&streams.motor_a).await.is_empty());
    }

    #[test]
    fn command_message_splits_verb_and_args() {
        let message = command_message("  ffwd   250 ", "abc".to_owned()).unwrap();
        assert_eq!(message.cmd, "ffwd");
        assert_eq!(message.args, "250");
        assert_eq!(message.id.as_deref(), Some("abc"));

        let noop = command_message("noop", "n".to_owned()).unwrap();
        assert_eq!(noop.args, "");
    }

    #[test]
    fn command_message_rejects_invalid_text() {
        assert!(matches!(
            command_message("jump 3", "x".to_owned()),
            Err(CtlError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn send_command_appends_to_command_channel() {
        let log = MemoryLog::new();
        let streams = StreamsConfig::default();
        let message = command_message("lt 90", "c-1".to_owned()).unwrap();
        let id = send_command(&log, &streams, &message).await.unwrap();

        let events = log.events(&streams.command).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events.first().map(|e| e.id), Some(id));
        assert_eq!(
            CommandMessage::from_fields(&events.first().unwrap().fields).unwrap(),
            message
        );
    }
}
