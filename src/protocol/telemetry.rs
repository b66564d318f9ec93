//! Typed telemetry records decoded from ST24 responses.
//!
//! Field names serialize to the short keys used on the JSON surface
//! (`el`, `az`, `NIDOK`, ...).

use serde::{Deserialize, Serialize};

/// Signal strength, from the `R` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Received signal level
    pub level: u32,
    /// Lock threshold
    pub threshold: u32,
    /// Network ID, kept as text to preserve leading zeros
    pub nid: String,
    /// Trailing counter field
    pub count: u32,
}

/// Antenna position in degrees, from the `P` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Elevation
    #[serde(rename = "el")]
    pub elevation: f64,
    /// Azimuth
    #[serde(rename = "az")]
    pub azimuth: f64,
    /// Polarization skew
    #[serde(rename = "pol")]
    pub polarization: f64,
    /// Reserve / relative azimuth, unscaled
    #[serde(rename = "rel")]
    pub reserve: u32,
}

/// Inclinometer readings in degrees, from the `H` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclinometerRecord {
    /// X tilt
    pub xt: f64,
    /// Y tilt
    pub yt: f64,
    /// First RP reading
    pub rp1: f64,
    /// Second RP reading
    pub rp2: f64,
}

/// Platform attitude in degrees, from the `G` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttitudeRecord {
    /// Roll
    pub roll: f64,
    /// Pitch
    pub pitch: f64,
    /// Yaw, unsigned heading
    pub yaw: f64,
}

/// Status word, from the `^S` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// The four hex digits as received
    pub raw: String,
    /// Bit 0: network ID matched
    #[serde(rename = "NIDOK")]
    pub nid_ok: bool,
    /// Bit 1: tracking
    #[serde(rename = "TRACKF")]
    pub tracking: bool,
    /// Bit 2: signal above threshold
    #[serde(rename = "THRSF")]
    pub above_threshold: bool,
    /// Bit 3: searching
    #[serde(rename = "SRCHF")]
    pub searching: bool,
}

impl StatusRecord {
    /// Network ID matched
    pub const NIDOK: u16 = 0x0001;
    /// Tracking
    pub const TRACKF: u16 = 0x0002;
    /// Above threshold
    pub const THRSF: u16 = 0x0004;
    /// Searching
    pub const SRCHF: u16 = 0x0008;

    /// Decode the flag bits of `word`, keeping `raw` as received.
    pub fn from_word(raw: impl Into<String>, word: u16) -> Self {
        Self {
            raw: raw.into(),
            nid_ok: word & Self::NIDOK != 0,
            tracking: word & Self::TRACKF != 0,
            above_threshold: word & Self::THRSF != 0,
            searching: word & Self::SRCHF != 0,
        }
    }
}

/// Telemetry domains fed by the poll sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// `R`
    Signal,
    /// `P`
    Position,
    /// `H`
    Inclinometer,
    /// `G`
    Attitude,
    /// `^S`
    Status,
}

/// One decoded record, tagged by domain.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryRecord {
    /// Signal record
    Signal(SignalRecord),
    /// Position record
    Position(PositionRecord),
    /// Inclinometer record
    Inclinometer(InclinometerRecord),
    /// Attitude record
    Attitude(AttitudeRecord),
    /// Status record
    Status(StatusRecord),
}

impl TelemetryRecord {
    /// Domain this record belongs to.
    pub fn domain(&self) -> Domain {
        match self {
            TelemetryRecord::Signal(_) => Domain::Signal,
            TelemetryRecord::Position(_) => Domain::Position,
            TelemetryRecord::Inclinometer(_) => Domain::Inclinometer,
            TelemetryRecord::Attitude(_) => Domain::Attitude,
            TelemetryRecord::Status(_) => Domain::Status,
        }
    }
}
