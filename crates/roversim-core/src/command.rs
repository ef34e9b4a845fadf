//! Text command protocol.
//!
//! Commands are a verb optionally followed by one numeric argument,
//! matched case-insensitively after trimming whitespace:
//!
//! | command      | motor A | motor B | hold                  |
//! |--------------|---------|---------|-----------------------|
//! | `noop`       | -       | -       | 0 s                   |
//! | `lt <deg>`   | -0.8    | 0.8     | 1.32 x abs(deg) / 100 |
//! | `rt <deg>`   | 0.8     | -0.8    | 1.32 x abs(deg) / 100 |
//! | `fwd <d>`    | 0.8     | 0.8     | d / 100               |
//! | `ffwd <d>`   | 1.0     | 1.0     | d / 100               |
//! | `bck <d>`    | -0.8    | -0.8    | d / 100               |
//!
//! Once the hold has elapsed the caller stops both motors.

use std::fmt;
use std::num::ParseFloatError;
use std::str::FromStr;
use std::time::Duration;

/// Power applied to both motors while turning.
pub const TURN_POWER: f64 = 0.8;
/// Power applied by `fwd` and `bck`.
pub const DRIVE_POWER: f64 = 0.8;
/// Power applied by `ffwd`.
pub const FAST_POWER: f64 = 1.0;
/// Hold seconds per 100 degrees of turn.
const TURN_SECONDS_PER_100_DEG: f64 = 1.32;
/// Hold seconds per 100 units of distance.
const DRIVE_SECONDS_PER_100: f64 = 1.0;

/// Errors produced when parsing a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The command text is blank.
    #[error("empty command")]
    Empty,

    /// The verb is not recognized.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The verb needs an argument and none was given.
    #[error("{verb} requires an argument")]
    MissingArgument {
        /// The verb missing its argument.
        verb: &'static str,
    },

    /// The argument is not a usable number.
    #[error("invalid argument for {verb}: {value} ({reason})")]
    InvalidArgument {
        /// The verb the argument belongs to.
        verb: &'static str,
        /// The argument as given.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// More arguments were given than the verb accepts.
    #[error("unexpected argument for {verb}: {extra}")]
    UnexpectedArgument {
        /// The verb that was given too much.
        verb: &'static str,
        /// The first surplus token.
        extra: String,
    },
}

/// A parsed rover command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Do nothing.
    Noop,
    /// Spin left by the given angle in degrees.
    Left(f64),
    /// Spin right by the given angle in degrees.
    Right(f64),
    /// Drive forward the given distance.
    Forward(f64),
    /// Drive forward at full power the given distance.
    FastForward(f64),
    /// Drive backward the given distance.
    Back(f64),
}

/// What a command does to the motors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorIntent {
    /// Powers for motors A and B, or `None` to leave them unchanged.
    pub powers: Option<(f64, f64)>,
    /// How long to hold the powers before stopping.
    pub hold: Duration,
}

impl MotorIntent {
    /// An intent that changes nothing.
    pub const NONE: Self = Self {
        powers: None,
        hold: Duration::ZERO,
    };
}

impl Command {
    /// Parse one command line.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] describing why the text is not a
    /// command. Parsing errors are never fatal to the caller.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut tokens = text.split_whitespace();
        let verb = tokens.next().ok_or(ProtocolError::Empty)?.to_ascii_lowercase();

        let (name, build): (&'static str, fn(f64) -> Self) = match verb.as_str() {
            "noop" => {
                expect_end("noop", tokens.next())?;
                return Ok(Self::Noop);
            }
            "lt" => ("lt", Self::Left),
            "rt" => ("rt", Self::Right),
            "fwd" => ("fwd", Self::Forward),
            "ffwd" => ("ffwd", Self::FastForward),
            "bck" => ("bck", Self::Back),
            _ => return Err(ProtocolError::UnknownCommand(verb)),
        };

        let raw = tokens
            .next()
            .ok_or(ProtocolError::MissingArgument { verb: name })?;
        expect_end(name, tokens.next())?;
        let value = parse_argument(name, raw)?;
        let command = build(value);
        // Validate the hold up front so intent() cannot fail.
        command.hold_seconds().and_then(|secs| to_duration(name, raw, secs))?;
        Ok(command)
    }

    /// The verb as written on the wire.
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Left(_) => "lt",
            Self::Right(_) => "rt",
            Self::Forward(_) => "fwd",
            Self::FastForward(_) => "ffwd",
            Self::Back(_) => "bck",
        }
    }

    /// Motor powers and hold duration for this command.
    pub fn intent(&self) -> MotorIntent {
        let powers = match self {
            Self::Noop => return MotorIntent::NONE,
            Self::Left(_) => (-TURN_POWER, TURN_POWER),
            Self::Right(_) => (TURN_POWER, -TURN_POWER),
            Self::Forward(_) => (DRIVE_POWER, DRIVE_POWER),
            Self::FastForward(_) => (FAST_POWER, FAST_POWER),
            Self::Back(_) => (-DRIVE_POWER, -DRIVE_POWER),
        };
        let hold = self
            .hold_seconds()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(Duration::ZERO);
        MotorIntent {
            powers: Some(powers),
            hold,
        }
    }

    fn hold_seconds(&self) -> Result<f64, ProtocolError> {
        match *self {
            Self::Noop => Ok(0.0),
            Self::Left(deg) | Self::Right(deg) => {
                Ok(TURN_SECONDS_PER_100_DEG * deg.abs() / 100.0)
            }
            Self::Forward(d) | Self::FastForward(d) | Self::Back(d) => {
                if d < 0.0 {
                    return Err(ProtocolError::InvalidArgument {
                        verb: self.verb(),
                        value: d.to_string(),
                        reason: "distance must not be negative".to_owned(),
                    });
                }
                Ok(DRIVE_SECONDS_PER_100 * d / 100.0)
            }
        }
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => f.write_str("noop"),
            Self::Left(v) | Self::Right(v) | Self::Forward(v) | Self::FastForward(v) | Self::Back(v) => {
                write!(f, "{} {v}", self.verb())
            }
        }
    }
}

fn expect_end(verb: &'static str, extra: Option<&str>) -> Result<(), ProtocolError> {
    extra.map_or(Ok(()), |extra| {
        Err(ProtocolError::UnexpectedArgument {
            verb,
            extra: extra.to_owned(),
        })
    })
}

fn parse_argument(verb: &'static str, raw: &str) -> Result<f64, ProtocolError> {
    let value: f64 = raw
        .parse()
        .map_err(|err: ParseFloatError| ProtocolError::InvalidArgument {
            verb,
            value: raw.to_owned(),
            reason: err.to_string(),
        })?;
    if !value.is_finite() {
        return Err(ProtocolError::InvalidArgument {
            verb,
            value: raw.to_owned(),
            reason: "not finite".to_owned(),
        });
    }
    Ok(value)
}

fn to_duration(verb: &'static str, raw: &str, secs: f64) -> Result<Duration, ProtocolError> {
    Duration::try_from_secs_f64(secs).map_err(|err| ProtocolError::InvalidArgument {
        verb,
        value: raw.to_owned(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn intent(text: &str) -> MotorIntent {
        Command::parse(text).unwrap().intent()
    }

    fn assert_hold(intent: MotorIntent, secs: f64) {
        assert!(
            (intent.hold.as_secs_f64() - secs).abs() < 1e-9,
            "hold {:?} != {secs}",
            intent.hold
        );
    }

    #[test]
    fn left_turn() {
        let i = intent("lt 50");
        assert_eq!(i.powers, Some((-0.8, 0.8)));
        assert_hold(i, 0.66);
    }

    #[test]
    fn right_turn() {
        let i = intent("rt 100");
        assert_eq!(i.powers, Some((0.8, -0.8)));
        assert_hold(i, 1.32);
    }

    #[test]
    fn negative_turn_uses_magnitude() {
        assert_hold(intent("lt -50"), 0.66);
    }

    #[test]
    fn drives() {
        let fwd = intent("fwd 200");
        assert_eq!(fwd.powers, Some((0.8, 0.8)));
        assert_hold(fwd, 2.0);

        let ffwd = intent("ffwd 50");
        assert_eq!(ffwd.powers, Some((1.0, 1.0)));
        assert_hold(ffwd, 0.5);

        let bck = intent("bck 100");
        assert_eq!(bck.powers, Some((-0.8, -0.8)));
        assert_hold(bck, 1.0);
    }

    #[test]
    fn noop_changes_nothing() {
        assert_eq!(intent("noop"), MotorIntent::NONE);
    }

    #[test]
    fn case_and_whitespace_are_ignored() {
        assert_eq!(Command::parse("  FWD   100 \n").unwrap(), Command::Forward(100.0));
        assert_eq!("NoOp".parse::<Command>().unwrap(), Command::Noop);
    }

    #[test]
    fn unknown_and_empty() {
        assert_eq!(
            Command::parse("bogus"),
            Err(ProtocolError::UnknownCommand("bogus".to_owned()))
        );
        assert_eq!(Command::parse("   "), Err(ProtocolError::Empty));
    }

    #[test]
    fn argument_errors() {
        assert_eq!(
            Command::parse("fwd"),
            Err(ProtocolError::MissingArgument { verb: "fwd" })
        );
        assert!(matches!(
            Command::parse("rt left"),
            Err(ProtocolError::InvalidArgument { verb: "rt", .. })
        ));
        assert!(matches!(
            Command::parse("fwd inf"),
            Err(ProtocolError::InvalidArgument { ref reason, .. }) if reason == "not finite"
        ));
        assert!(matches!(
            Command::parse("bck -10"),
            Err(ProtocolError::InvalidArgument { verb: "bck", .. })
        ));
        assert!(matches!(
            Command::parse("fwd 1e300"),
            Err(ProtocolError::InvalidArgument { verb: "fwd", .. })
        ));
        assert!(matches!(
            Command::parse("noop 5"),
            Err(ProtocolError::UnexpectedArgument { verb: "noop", .. })
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let cmd = Command::Right(45.0);
        assert_eq!(cmd.to_string(), "rt 45");
        assert_eq!(cmd.to_string().parse::<Command>().unwrap(), cmd);
    }
}
