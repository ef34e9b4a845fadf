//! Configuration loading and typed config structures for the rover simulation.
//!
//! The canonical configuration lives in `roversim-config.yaml` in the
//! working directory. This module defines strongly-typed structs that mirror
//! the YAML structure, and provides a loader that reads and validates the
//! file. Every field has a default, so an empty file (or no file at all)
//! yields a working configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::kinematics::DriveParams;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its allowed range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `roversim-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RoversimConfig {
    /// Which rover this process simulates.
    #[serde(default)]
    pub rover: RoverConfig,

    /// Drive-train constants used by the kinematic model.
    #[serde(default)]
    pub drive: DriveConfig,

    /// Event-log channel names and start policies.
    #[serde(default)]
    pub streams: StreamsConfig,

    /// Event pipeline timing.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,
}

impl RoversimConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for infrastructure URLs:
    /// - `DRAGONFLY_URL` overrides `infrastructure.dragonfly_url`
    /// - `REDIS_URL` is accepted as a fallback for the same setting
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as a map.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.infrastructure.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults (with
    /// environment overrides still applied).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be loaded.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            let mut config = Self::default();
            config.infrastructure.apply_env_overrides();
            Ok(config)
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rover.id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "rover.id must not be empty".to_owned(),
            });
        }
        if !(self.drive.max_motor_velocity.is_finite() && self.drive.max_motor_velocity > 0.0) {
            return Err(ConfigError::Invalid {
                reason: "drive.max_motor_velocity must be positive".to_owned(),
            });
        }
        if !(self.drive.wheelbase_length.is_finite() && self.drive.wheelbase_length > 0.0) {
            return Err(ConfigError::Invalid {
                reason: "drive.wheelbase_length must be positive".to_owned(),
            });
        }
        if self.pipeline.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "pipeline.poll_timeout_ms must be at least 1".to_owned(),
            });
        }
        if self.pipeline.time_step_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "pipeline.time_step_ms must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Rover identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoverConfig {
    /// Entity id of the rover; motor and compass ids derive from it.
    #[serde(default = "default_rover_id")]
    pub id: String,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            id: default_rover_id(),
        }
    }
}

/// Drive-train constants.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DriveConfig {
    /// Linear speed at full motor power, in meters per second.
    #[serde(default = "default_max_motor_velocity")]
    pub max_motor_velocity: f64,

    /// Distance between the two wheels, in meters.
    #[serde(default = "default_wheelbase_length")]
    pub wheelbase_length: f64,
}

impl DriveConfig {
    /// Convert into the parameters consumed by the kinematic model.
    pub const fn params(&self) -> DriveParams {
        DriveParams {
            max_motor_velocity: self.max_motor_velocity,
            wheelbase_length: self.wheelbase_length,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_motor_velocity: default_max_motor_velocity(),
            wheelbase_length: default_wheelbase_length(),
        }
    }
}

/// Where consumption of a channel begins when the process starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPolicy {
    /// Skip history: start after the newest event present at startup.
    Tail,
    /// Resume after the last committed cursor, or the tail if none.
    Committed,
}

/// Event-log channel names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamsConfig {
    /// Power requests for motor A.
    #[serde(default = "default_motor_a_stream")]
    pub motor_a: String,

    /// Power requests for motor B.
    #[serde(default = "default_motor_b_stream")]
    pub motor_b: String,

    /// Textual commands.
    #[serde(default = "default_command_stream")]
    pub command: String,

    /// Outbound telemetry.
    #[serde(default = "default_telemetry_stream")]
    pub telemetry: String,

    /// Outbound command results.
    #[serde(default = "default_result_stream")]
    pub results: String,

    /// Start policy for both motor channels.
    #[serde(default = "default_motor_start")]
    pub motor_start: StartPolicy,

    /// Start policy for the command channel.
    #[serde(default = "default_command_start")]
    pub command_start: StartPolicy,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            motor_a: default_motor_a_stream(),
            motor_b: default_motor_b_stream(),
            command: default_command_stream(),
            telemetry: default_telemetry_stream(),
            results: default_result_stream(),
            motor_start: default_motor_start(),
            command_start: default_command_start(),
        }
    }
}

/// Event pipeline timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Longest time to block waiting for events before ticking anyway.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Maximum events fetched per channel per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Fixed simulated step used by the offline simulator.
    #[serde(default = "default_time_step_ms")]
    pub time_step_ms: u64,
}

impl PipelineConfig {
    /// Poll timeout as a [`Duration`].
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Offline time step as a [`Duration`].
    pub const fn time_step(&self) -> Duration {
        Duration::from_millis(self.time_step_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            batch_size: default_batch_size(),
            time_step_ms: default_time_step_ms(),
        }
    }
}

/// Infrastructure connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// Redis-compatible URL of the Dragonfly instance holding state and streams.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// Prefix for every state key written by the simulation.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl InfrastructureConfig {
    /// Override connection strings from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.dragonfly_url = val;
        } else if let Ok(val) = std::env::var("REDIS_URL") {
            self.dragonfly_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            dragonfly_url: default_dragonfly_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_rover_id() -> String {
    "prime".to_owned()
}

const fn default_max_motor_velocity() -> f64 {
    DriveParams::MAX_MOTOR_VELOCITY
}

const fn default_wheelbase_length() -> f64 {
    DriveParams::WHEELBASE_LENGTH
}

fn default_motor_a_stream() -> String {
    "yakapi:prime:motor_a".to_owned()
}

fn default_motor_b_stream() -> String {
    "yakapi:prime:motor_b".to_owned()
}

fn default_command_stream() -> String {
    "yakapi:prime:cmd".to_owned()
}

fn default_telemetry_stream() -> String {
    "yakapi:prime:telemetry".to_owned()
}

fn default_result_stream() -> String {
    "yakapi:prime:results".to_owned()
}

const fn default_motor_start() -> StartPolicy {
    StartPolicy::Tail
}

const fn default_command_start() -> StartPolicy {
    StartPolicy::Committed
}

const fn default_poll_timeout_ms() -> u64 {
    100
}

const fn default_batch_size() -> u64 {
    64
}

const fn default_time_step_ms() -> u64 {
    100
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379/0".to_owned()
}

fn default_key_prefix() -> String {
    "roversim".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RoversimConfig::default();
        assert_eq!(config.rover.id, "prime");
        assert_eq!(config.streams.motor_a, "yakapi:prime:motor_a");
        assert_eq!(config.streams.motor_start, StartPolicy::Tail);
        assert_eq!(config.streams.command_start, StartPolicy::Committed);
        assert_eq!(config.pipeline.poll_timeout(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_yaml_fills_defaults() {
        let yaml = r"
rover:
  id: scout
drive:
  max_motor_velocity: 0.5
streams:
  command: scout:cmd
  motor_start: committed
pipeline:
  poll_timeout_ms: 250
";
        let config = RoversimConfig::parse(yaml).unwrap();
        assert_eq!(config.rover.id, "scout");
        assert!((config.drive.max_motor_velocity - 0.5).abs() < f64::EPSILON);
        assert!((config.drive.wheelbase_length - DriveParams::WHEELBASE_LENGTH).abs() < f64::EPSILON);
        assert_eq!(config.streams.command, "scout:cmd");
        assert_eq!(config.streams.motor_b, "yakapi:prime:motor_b");
        assert_eq!(config.streams.motor_start, StartPolicy::Committed);
        assert_eq!(config.pipeline.poll_timeout_ms, 250);
        assert_eq!(config.pipeline.batch_size, 64);
    }

    #[test]
    fn empty_yaml_is_default() {
        let config = RoversimConfig::parse("").unwrap();
        assert_eq!(config.rover, RoverConfig::default());
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn rejects_non_positive_drive_constants() {
        let result = RoversimConfig::parse("drive:\n  wheelbase_length: 0.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn rejects_zero_poll_timeout() {
        let result = RoversimConfig::parse("pipeline:\n  poll_timeout_ms: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let result = RoversimConfig::parse("rover: [unterminated");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn drive_config_converts_to_params() {
        let params = DriveConfig::default().params();
        assert!((params.max_motor_velocity - 0.001).abs() < f64::EPSILON);
        assert!((params.wheelbase_length - 0.005).abs() < f64::EPSILON);
    }
}
