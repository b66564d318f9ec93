//! Error types for the ST24 control engine.
//!
//! `St24Error` covers the failures that are surfaced to a caller of the
//! engine. Most protocol trouble never becomes an error at all: parse misses
//! and response timeouts degrade to empty telemetry records, and a poll that
//! overlaps a running one is reported as `busy` in the poll result.
//!
//! ## Error Hierarchy
//!
//! - **`Catalog`**: the device catalog could not enumerate serial devices.
//! - **`Open`**: a device identifier could not be opened (bad path, device busy,
//!   permission denied).
//! - **`NotConnected`**: an operation needs an open link and there is none.
//! - **`Write`**: bytes could not be written to an open link.
//! - **`Busy`**: a manual command could not get the sequencer gate in time.
//! - **`InvalidCommand`**: a manual command was empty.
//!
//! Configuration problems live in [`crate::config::ConfigError`].

use thiserror::Error;

/// Convenience alias for results using the engine error type.
pub type St24Result<T> = std::result::Result<T, St24Error>;

/// Errors returned by the engine.
#[derive(Error, Debug)]
pub enum St24Error {
    /// Serial devices could not be enumerated
    #[error("Device enumeration failed: {0}")]
    Catalog(String),

    /// A device could not be opened
    #[error("Failed to open '{identifier}': {reason}")]
    Open {
        /// Device path or name as requested
        identifier: String,
        /// Reason reported by the catalog
        reason: String,
    },

    /// No link is open
    #[error("Serial port not connected")]
    NotConnected,

    /// Bytes could not be written to the link
    #[error("Serial write failed: {0}")]
    Write(#[source] std::io::Error),

    /// The sequencer gate stayed held for the whole wait
    #[error("Sequencer busy: gate not released within {0:?}")]
    Busy(std::time::Duration),

    /// A manual command was rejected before sending
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}
