//! Device access: serial catalog and connection lifecycle.

pub mod connection;

pub use connection::{filter_candidates, Connection, DeviceCatalog, FramingConfig, SerialCatalog};
