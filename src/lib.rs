//! Command/response engine for the ST24 satellite antenna positioner.
//!
//! The ST24 speaks a half-duplex, line-oriented ASCII protocol over a serial
//! link. This crate drives its fixed poll sequence (`$ R P H G ^S %`),
//! delimits each response block by sentinel lines with a deadline fallback,
//! and decodes the replies into typed telemetry. Only one sequence runs
//! against the link at a time.
//!
//! The entry point is [`controller::St24Controller`].

pub mod adapters;
pub mod config;
pub mod controller;
pub mod error;
pub mod hardware;
pub mod protocol;

pub use controller::{SendAck, St24Controller};
pub use error::{St24Error, St24Result};
pub use protocol::PollResult;
