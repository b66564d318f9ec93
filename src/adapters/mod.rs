//! Serial I/O adapters
//!
//! This module turns an open duplex byte stream into the line-oriented
//! channel the protocol layer works with.

pub mod line_channel;

pub use line_channel::{DynSerial, LineChannel, LineSubscription, SerialIo};
