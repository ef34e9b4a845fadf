//! Identifier types.
//!
//! Entities are keyed by explicit string ids, never by object identity.
//! Stream events carry a [`EventId`] in the `<millis>-<seq>` form used by
//! Redis-compatible streams; ids are totally ordered so cursors can be
//! checked for strict monotonicity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unique identifier for a simulated entity (rover, motor, compass).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the id of a component owned by this entity, e.g.
    /// `prime` + `motor_a` = `prime:motor_a`.
    pub fn child(&self, part: &str) -> Self {
        Self(format!("{}:{part}", self.0))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Errors raised when parsing an [`EventId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventIdError {
    /// The text is not of the form `<millis>-<seq>` or `<millis>`.
    #[error("malformed event id: {0:?}")]
    Malformed(String),
}

/// Position of an event within a channel.
///
/// Ordered first by `millis` then by `seq`. [`EventId::ZERO`] sorts before
/// every real event and is the cursor for an empty channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId {
    /// Milliseconds component.
    pub millis: u64,
    /// Sequence number within the millisecond.
    pub seq: u64,
}

impl EventId {
    /// The id before any event (`0-0`).
    pub const ZERO: Self = Self { millis: 0, seq: 0 };

    /// Create an id from its two components.
    pub const fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }

    /// The smallest id strictly greater than `self`.
    ///
    /// Saturates at the maximum representable id.
    pub const fn successor(self) -> Self {
        match self.seq.checked_add(1) {
            Some(seq) => Self {
                millis: self.millis,
                seq,
            },
            None => match self.millis.checked_add(1) {
                Some(millis) => Self { millis, seq: 0 },
                None => self,
            },
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for EventId {
    type Err = EventIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || EventIdError::Malformed(s.to_owned());
        let trimmed = s.trim();
        let (millis, seq) = match trimmed.split_once('-') {
            Some((millis, seq)) => (millis, seq),
            None => (trimmed, "0"),
        };
        let millis = millis.parse::<u64>().map_err(|_err| malformed())?;
        let seq = seq.parse::<u64>().map_err(|_err| malformed())?;
        Ok(Self { millis, seq })
    }
}

impl TryFrom<String> for EventId {
    type Error = EventIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.to_string()
    }
}
