//! ST24 Configuration System
//!
//! Configuration is loaded with Figment from (in order of precedence):
//! 1. Environment variables prefixed with `ST24_`
//! 2. TOML configuration file (default: `config/st24.toml`)
//! 3. Built-in defaults
//!
//! # Example
//!
//! ```no_run
//! use st24_control::config::St24Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = St24Config::load()?;
//!     println!("Baud rate: {}", config.serial.baud_rate);
//!     println!("Response timeout: {:?}", config.protocol.response_timeout());
//!     Ok(())
//! }
//! ```
//!
//! # Environment Variables
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! ST24_APPLICATION__LOG_LEVEL=debug
//! ST24_SERIAL__BAUD_RATE=19200
//! ST24_PROTOCOL__RESPONSE_TIMEOUT_MS=1500
//! ```

pub mod st24_config;

pub use st24_config::{
    ApplicationConfig, ConfigError, PollConfig, ProtocolConfig, SerialConfig, St24Config,
};
