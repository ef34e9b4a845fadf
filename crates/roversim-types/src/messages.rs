//! Wire messages carried on the event log.
//!
//! Every event is a flat set of string fields. These types convert between
//! that representation and typed payloads.
//!
//! | Channel | Direction | Fields |
//! |---------|-----------|--------|
//! | motor power | in | `power` |
//! | command | in | `id?`, `cmd`, `args` |
//! | telemetry | out | `motor_a_power`, `motor_b_power`, `heading` |
//! | result | out | `id`, `result` or `error` |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::EventId;

/// Flat string-keyed field set of a single event.
pub type Fields = BTreeMap<String, String>;

/// Errors raised when decoding an event's fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field is present but cannot be interpreted.
    #[error("invalid value {value:?} for field `{field}`")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Raw value found.
        value: String,
    },
}

/// One event read from a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Channel (stream key) the event was read from.
    pub channel: String,
    /// Position of the event in its channel.
    pub id: EventId,
    /// Event payload.
    pub fields: Fields,
}

/// Request to set one motor's power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorPower {
    /// Requested power, nominally within `[-1, 1]` but not clamped.
    pub power: f64,
}

impl MotorPower {
    /// Decode from event fields.
    pub fn from_fields(fields: &Fields) -> Result<Self, MessageError> {
        let raw = fields
            .get("power")
            .ok_or(MessageError::MissingField("power"))?;
        let power = raw
            .trim()
            .parse::<f64>()
            .map_err(|_err| MessageError::InvalidField {
                field: "power",
                value: raw.clone(),
            })?;
        Ok(Self { power })
    }

    /// Encode as event fields.
    pub fn to_fields(self) -> Fields {
        Fields::from([("power".to_owned(), self.power.to_string())])
    }
}

/// A textual command, optionally correlated with an external id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Correlation id; results are only published when present.
    pub id: Option<String>,
    /// Command verb, e.g. `fwd`.
    pub cmd: String,
    /// Command argument, e.g. `100`. May be empty.
    pub args: String,
}

impl CommandMessage {
    /// Decode from event fields. `args` defaults to empty; an empty `id`
    /// counts as absent.
    pub fn from_fields(fields: &Fields) -> Result<Self, MessageError> {
        let cmd = fields
            .get("cmd")
            .ok_or(MessageError::MissingField("cmd"))?
            .clone();
        let args = fields.get("args").cloned().unwrap_or_default();
        let id = fields
            .get("id")
            .filter(|id| !id.trim().is_empty())
            .cloned();
        Ok(Self { id, cmd, args })
    }

    /// Encode as event fields.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(id) = &self.id {
            fields.insert("id".to_owned(), id.clone());
        }
        fields.insert("cmd".to_owned(), self.cmd.clone());
        fields.insert("args".to_owned(), self.args.clone());
        fields
    }

    /// The full command line, `cmd` and `args` joined by a space.
    pub fn text(&self) -> String {
        format!("{} {}", self.cmd, self.args).trim().to_owned()
    }
}

/// Snapshot of the rover's actuators and compass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Current power of motor A.
    pub motor_a_power: f64,
    /// Current power of motor B.
    pub motor_b_power: f64,
    /// Compass heading in degrees.
    pub heading: f64,
}

impl Telemetry {
    /// Encode as event fields.
    pub fn to_fields(self) -> Fields {
        Fields::from([
            ("motor_a_power".to_owned(), self.motor_a_power.to_string()),
            ("motor_b_power".to_owned(), self.motor_b_power.to_string()),
            ("heading".to_owned(), self.heading.to_string()),
        ])
    }
}

/// Outcome reported for a correlated command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// The command was applied.
    Ok,
    /// The command was rejected; the message explains why.
    Error(String),
}

/// Result event for a correlated command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Correlation id copied from the command.
    pub id: String,
    /// What happened.
    pub outcome: CommandOutcome,
}

impl CommandResult {
    /// Encode as event fields: `{id, result: "ok"}` or `{id, error}`.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::from([("id".to_owned(), self.id.clone())]);
        match &self.outcome {
            CommandOutcome::Ok => {
                fields.insert("result".to_owned(), "ok".to_owned());
            }
            CommandOutcome::Error(message) => {
                fields.insert("error".to_owned(), message.clone());
            }
        }
        fields
    }

    /// Decode from event fields.
    pub fn from_fields(fields: &Fields) -> Result<Self, MessageError> {
        let id = fields
            .get("id")
            .ok_or(MessageError::MissingField("id"))?
            .clone();
        let outcome = match (fields.get("result"), fields.get("error")) {
            (_, Some(error)) => CommandOutcome::Error(error.clone()),
            (Some(result), None) if result == "ok" => CommandOutcome::Ok,
            (Some(result), None) => {
                return Err(MessageError::InvalidField {
                    field: "result",
                    value: result.clone(),
                });
            }
            (None, None) => return Err(MessageError::MissingField("result")),
        };
        Ok(Self { id, outcome })
    }
}
