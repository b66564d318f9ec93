//! Poll result assembly.
//!
//! A [`Snapshot`] is the merge of the records one poll cycle produced; a
//! [`PollResult`] adds the link and sequencer state around it. Every
//! telemetry key is always present in the serialized form, with `{}` for a
//! domain that did not match this cycle.

use super::telemetry::{
    AttitudeRecord, InclinometerRecord, PositionRecord, SignalRecord, StatusRecord,
    TelemetryRecord,
};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Telemetry from one poll cycle. Each domain is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// From `R`
    #[serde(serialize_with = "record_or_empty")]
    pub signal: Option<SignalRecord>,
    /// From `P`
    #[serde(serialize_with = "record_or_empty")]
    pub position: Option<PositionRecord>,
    /// From `H`
    #[serde(rename = "inclin", serialize_with = "record_or_empty")]
    pub inclinometer: Option<InclinometerRecord>,
    /// From `G`
    #[serde(serialize_with = "record_or_empty")]
    pub attitude: Option<AttitudeRecord>,
    /// From `^S`
    #[serde(serialize_with = "record_or_empty")]
    pub status: Option<StatusRecord>,
}

impl Snapshot {
    /// Merge decoded records. A later record for the same domain replaces an earlier one.
    pub fn assemble<I>(records: I) -> Self
    where
        I: IntoIterator<Item = TelemetryRecord>,
    {
        let mut snapshot = Self::default();
        for record in records {
            snapshot.insert(record);
        }
        snapshot
    }

    /// Store `record` in its domain slot.
    pub fn insert(&mut self, record: TelemetryRecord) {
        match record {
            TelemetryRecord::Signal(r) => self.signal = Some(r),
            TelemetryRecord::Position(r) => self.position = Some(r),
            TelemetryRecord::Inclinometer(r) => self.inclinometer = Some(r),
            TelemetryRecord::Attitude(r) => self.attitude = Some(r),
            TelemetryRecord::Status(r) => self.status = Some(r),
        }
    }

    /// Number of domains that produced a record.
    pub fn matched(&self) -> usize {
        [
            self.signal.is_some(),
            self.position.is_some(),
            self.inclinometer.is_some(),
            self.attitude.is_some(),
            self.status.is_some(),
        ]
        .iter()
        .filter(|&&m| m)
        .count()
    }
}

fn record_or_empty<S, T>(record: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    match record {
        Some(record) => record.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

/// Outcome of one poll trigger. Built fresh per trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResult {
    /// A link was open when the poll was triggered
    pub connected: bool,
    /// The poll was rejected because another sequence was running
    pub busy: bool,
    /// Present only when the sequence actually ran
    #[serde(flatten)]
    pub telemetry: Option<Snapshot>,
}

impl PollResult {
    /// No open link; nothing was sent.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            busy: false,
            telemetry: None,
        }
    }

    /// Another sequence holds the gate; nothing was sent.
    pub fn busy() -> Self {
        Self {
            connected: true,
            busy: true,
            telemetry: None,
        }
    }

    /// A sequence ran to the end.
    pub fn completed(snapshot: Snapshot) -> Self {
        Self {
            connected: true,
            busy: false,
            telemetry: Some(snapshot),
        }
    }
}
