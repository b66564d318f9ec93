//! Field parsers for the five ST24 telemetry responses.
//!
//! Every parser picks the first line of a response block that carries its
//! marker, then matches one fixed grammar against it. A line that does not
//! match (or a number that does not fit) gives `None`; a garbled response
//! never turns into an error.
//!
//! | Command | Marker                 | Example line                              |
//! |---------|------------------------|-------------------------------------------|
//! | `R`     | contains `L`           | `>L2234t2033N055F@@R1:35`                 |
//! | `P`     | starts with `E`        | `>E0372A1993p0015R0000`                   |
//! | `H`     | contains `XT`          | `>XT:+00.0, YT:-01.1, RP:+014.7:+014.8`   |
//! | `G`     | contains `RL:`         | `>RL:+00.1, PT:-01.1, YA:199.5`           |
//! | `^S`    | exactly four hex digits| `0007`                                    |

use super::telemetry::{
    AttitudeRecord, Domain, InclinometerRecord, PositionRecord, SignalRecord, StatusRecord,
    TelemetryRecord,
};
use once_cell::sync::Lazy;
use regex::Regex;

static SIGNAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"L([0-9]+)t([0-9]+)N([0-9]+).*:([0-9]+)").expect("Invalid signal regex")
});

static POSITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)E([0-9]+)A([0-9]+)p([0-9]+)R([0-9]+)").expect("Invalid position regex")
});

static INCLINOMETER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"XT:([+-]?[0-9]+\.[0-9]+),\s*YT:([+-]?[0-9]+\.[0-9]+),\s*RP:([+-]?[0-9]+\.[0-9]+):([+-]?[0-9]+\.[0-9]+)",
    )
    .expect("Invalid inclinometer regex")
});

static ATTITUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"RL:([+-]?[0-9]+\.[0-9]+),\s*PT:([+-]?[0-9]+\.[0-9]+),\s*YA:([0-9]+\.[0-9]+)")
        .expect("Invalid attitude regex")
});

static STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Fa-f]{4}$").expect("Invalid status regex"));

/// Position fields are sent in tenths of a degree.
const POSITION_SCALE: f64 = 10.0;

/// First line satisfying `predicate`, or the empty string.
pub fn select_line<'a, P>(lines: &'a [String], predicate: P) -> &'a str
where
    P: Fn(&str) -> bool,
{
    lines
        .iter()
        .map(String::as_str)
        .find(|&l| predicate(l))
        .unwrap_or("")
}

/// `R` response: signal level, threshold, network ID and counter.
pub fn parse_signal(lines: &[String]) -> Option<SignalRecord> {
    let line = select_line(lines, |l| l.contains('L'));
    let caps = SIGNAL_RE.captures(line)?;
    Some(SignalRecord {
        level: caps[1].parse().ok()?,
        threshold: caps[2].parse().ok()?,
        nid: caps[3].to_string(),
        count: caps[4].parse().ok()?,
    })
}

/// `P` response: elevation, azimuth, polarization (tenths of a degree) and reserve.
///
/// The device echoes its `>` response marker in front of the data, so the
/// marker is skipped before checking for the leading `E`.
pub fn parse_position(lines: &[String]) -> Option<PositionRecord> {
    let line = select_line(lines, |l| l.trim_start_matches('>').starts_with('E'));
    let caps = POSITION_RE.captures(line)?;
    let tenths = |i: usize| caps[i].parse::<u32>().ok().map(|v| f64::from(v) / POSITION_SCALE);
    Some(PositionRecord {
        elevation: tenths(1)?,
        azimuth: tenths(2)?,
        polarization: tenths(3)?,
        reserve: caps[4].parse().ok()?,
    })
}

/// `H` response: inclinometer X/Y tilt and the two RP readings.
pub fn parse_inclinometer(lines: &[String]) -> Option<InclinometerRecord> {
    let line = select_line(lines, |l| l.contains("XT"));
    let caps = INCLINOMETER_RE.captures(line)?;
    Some(InclinometerRecord {
        xt: caps[1].parse().ok()?,
        yt: caps[2].parse().ok()?,
        rp1: caps[3].parse().ok()?,
        rp2: caps[4].parse().ok()?,
    })
}

/// `G` response: roll, pitch and yaw.
pub fn parse_attitude(lines: &[String]) -> Option<AttitudeRecord> {
    let line = select_line(lines, |l| l.contains("RL:"));
    let caps = ATTITUDE_RE.captures(line)?;
    Some(AttitudeRecord {
        roll: caps[1].parse().ok()?,
        pitch: caps[2].parse().ok()?,
        yaw: caps[3].parse().ok()?,
    })
}

/// `^S` response: a 16-bit status word in hex with four flag bits.
pub fn parse_status(lines: &[String]) -> Option<StatusRecord> {
    let line = lines
        .iter()
        .map(String::as_str)
        .find(|l| STATUS_RE.is_match(l))?;
    let word = u16::from_str_radix(line, 16).ok()?;
    Some(StatusRecord::from_word(line, word))
}

impl Domain {
    /// Decode a response block for this domain.
    pub fn parse(self, lines: &[String]) -> Option<TelemetryRecord> {
        match self {
            Domain::Signal => parse_signal(lines).map(TelemetryRecord::Signal),
            Domain::Position => parse_position(lines).map(TelemetryRecord::Position),
            Domain::Inclinometer => parse_inclinometer(lines).map(TelemetryRecord::Inclinometer),
            Domain::Attitude => parse_attitude(lines).map(TelemetryRecord::Attitude),
            Domain::Status => parse_status(lines).map(TelemetryRecord::Status),
        }
    }
}
