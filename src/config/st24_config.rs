//! Strongly-typed configuration loading using Figment.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/st24.toml";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or did not fit the schema
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    /// Values loaded but failed validation
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct St24Config {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Serial link settings
    #[serde(default)]
    pub serial: SerialConfig,
    /// Command/response timing
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Periodic polling
    #[serde(default)]
    pub poll: PollConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Serial link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Baud rate used when a connection request does not name one
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Line terminator, both for splitting responses and for ending commands
    #[serde(default = "default_line_terminator")]
    pub line_terminator: String,
    /// Regex a device path must match to be listed as a candidate
    #[serde(default = "default_device_pattern")]
    pub device_pattern: String,
}

/// Command/response timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Per-command deadline for a response block
    #[serde(default = "default_response_timeout")]
    pub response_timeout_ms: u64,
    /// Pause after each step of the poll sequence
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// How long a manual command waits for an in-flight poll to finish
    #[serde(default = "default_gate_timeout")]
    pub gate_timeout_ms: u64,
}

/// Periodic polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between poll triggers in watch mode
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_name() -> String {
    "st24".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_line_terminator() -> String {
    "\r".to_string()
}

fn default_device_pattern() -> String {
    r"(ttyUSB|ttyS|ttyACM|COM\d+)".to_string()
}

fn default_response_timeout() -> u64 {
    1000
}

fn default_settle_delay() -> u64 {
    150
}

fn default_gate_timeout() -> u64 {
    9000
}

fn default_poll_interval() -> u64 {
    2000
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            line_terminator: default_line_terminator(),
            device_pattern: default_device_pattern(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: default_response_timeout(),
            settle_delay_ms: default_settle_delay(),
            gate_timeout_ms: default_gate_timeout(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
        }
    }
}

impl SerialConfig {
    /// The terminator as a single byte.
    ///
    /// Only meaningful after [`St24Config::validate`] has accepted the config;
    /// falls back to carriage return otherwise.
    pub fn terminator_byte(&self) -> u8 {
        match self.line_terminator.as_bytes() {
            [b] => *b,
            _ => b'\r',
        }
    }
}

impl ProtocolConfig {
    /// Per-command response deadline.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Pause after each poll step.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Bound on a manual command's wait for the sequencer.
    pub fn gate_timeout(&self) -> Duration {
        Duration::from_millis(self.gate_timeout_ms)
    }
}

impl PollConfig {
    /// Time between watch-mode polls.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl St24Config {
    /// Load configuration from `config/st24.toml` and environment variables.
    ///
    /// A missing file is not an error; defaults and environment overrides
    /// still apply.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file is malformed or validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(St24Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ST24_").split("__"))
            .extract()
            .map_err(ConfigError::LoadError)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.serial.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "serial.baud_rate must be > 0".to_string(),
            ));
        }

        if self.serial.line_terminator.len() != 1 {
            return Err(ConfigError::ValidationError(format!(
                "serial.line_terminator must be a single byte, got {:?}",
                self.serial.line_terminator
            )));
        }

        if let Err(e) = Regex::new(&self.serial.device_pattern) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid serial.device_pattern '{}': {}",
                self.serial.device_pattern, e
            )));
        }

        if self.protocol.response_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "protocol.response_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
