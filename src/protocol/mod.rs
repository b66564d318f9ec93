//! ST24 command/response protocol.
//!
//! - [`collector`]: delimits one response block by sentinel or deadline
//! - [`gate`]: single-flight token shared by polls and manual commands
//! - [`sequencer`]: the fixed seven-command poll sequence
//! - [`parsers`] and [`telemetry`]: decoding into typed records
//! - [`snapshot`]: the assembled poll result

pub mod collector;
pub mod gate;
pub mod parsers;
pub mod sequencer;
pub mod snapshot;
pub mod telemetry;

pub use collector::{CollectedBlock, ResponseCollector, Settlement, TIMEOUT_PLACEHOLDER};
pub use gate::{GateGuard, SequencerGate};
pub use sequencer::{CommandStep, PollSequence, Sequencer};
pub use snapshot::{PollResult, Snapshot};
pub use telemetry::{
    AttitudeRecord, Domain, InclinometerRecord, PositionRecord, SignalRecord, StatusRecord,
    TelemetryRecord,
};
