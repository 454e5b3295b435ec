//! Temporal reconstruction for split spreadsheets.
//!
//! The export tool encodes checkpoint times as timestamps on an arbitrary
//! placeholder date — only the time of day is real. A runner's first
//! non-placeholder, non-range timestamp donates its calendar date
//! (truncated to midnight UTC) as the reference instant; every timestamp
//! is then reinterpreted as an offset from that reference and re-anchored
//! to the year's official start instant.
//!
//! Occasionally a cell is an in/out range for one aide station, encoded as
//! text:
//!
//!   07:44:00-07:46:00
//!   01:36:00---:--
//!   --:-----:--
//!   --:---01:36:00
//!
//! where `--:--` means "not recorded" on either side.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;

use crate::common::error::{Result, ScraperError};
use crate::pipeline::resource::iso;

pub const TIME_PLACEHOLDER: &str = "--:--";

/// Substituted for the placeholder before splitting a range on `-`, so the
/// hyphens inside the placeholder can't be mistaken for the separator.
const TIME_HOLD: &str = "__UNKNOWN__";

/// A single resolved point in time: either the placeholder or an absolute
/// instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimePoint {
    NotRecorded,
    At(DateTime<Utc>),
}

impl Serialize for TimePoint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TimePoint::NotRecorded => serializer.serialize_str(TIME_PLACEHOLDER),
            TimePoint::At(instant) => serializer.serialize_str(&iso(*instant)),
        }
    }
}

/// A checkpoint time: one instant, or an entrance/exit pair at one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CheckTime {
    Point(TimePoint),
    Range {
        #[serde(rename = "in")]
        entry: TimePoint,
        #[serde(rename = "out")]
        exit: TimePoint,
    },
}

/// Checkpoint standing: an ordinal, an in/out ordinal pair, raw text the
/// sheet put there instead, or nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Position {
    None,
    Ordinal(i64),
    Pair {
        #[serde(rename = "in")]
        entry: i64,
        #[serde(rename = "out")]
        exit: i64,
    },
    Text(String),
}

/// One aide-station record: name, time (or range), standing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckIn {
    pub name: String,
    pub time: CheckTime,
    pub position: Position,
}

/// True for strings like `07:44:00-07:46:00` or `--:---01:36:00`, false
/// for the bare placeholder and for plain time tokens.
pub fn is_time_range(text: &str) -> bool {
    if text == TIME_PLACEHOLDER {
        return false;
    }
    if text.contains(TIME_PLACEHOLDER) {
        return true;
    }
    if !text.contains('-') {
        return false;
    }
    let parts: Vec<&str> = text.split('-').collect();
    parts.len() == 2 && parts[0].contains(':') && parts[1].contains(':')
}

/// Parses `H:MM:SS` or `D:H:MM:SS` into an offset from the start gun.
/// Anything that is not 3 or 4 colon-separated numeric components is fatal.
pub fn parse_clock_offset(token: &str) -> Result<Duration> {
    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(ScraperError::TimeFormat(format!(
            "expected 3 or 4 parts, but got {} - {token}",
            parts.len()
        )));
    }

    let mut numbers = Vec::with_capacity(parts.len());
    for part in &parts {
        let n: i64 = part.parse().map_err(|_| {
            ScraperError::TimeFormat(format!("non-numeric component \"{part}\" in {token}"))
        })?;
        numbers.push(n);
    }

    let mut seconds = 0;
    seconds += numbers.pop().unwrap_or(0); // seconds
    seconds += numbers.pop().unwrap_or(0) * 60; // minutes
    seconds += numbers.pop().unwrap_or(0) * 60 * 60; // hours
    if let Some(days) = numbers.pop() {
        seconds += days * 24 * 60 * 60;
    }
    Ok(Duration::seconds(seconds))
}

/// Resolves an in/out range. Each side is independently the placeholder or
/// an offset from the official start.
pub fn resolve_range(raw: &str, official_start: DateTime<Utc>) -> Result<CheckTime> {
    let safe = raw.replace(TIME_PLACEHOLDER, TIME_HOLD);

    let (left, right) = match safe.split('-').collect::<Vec<&str>>()[..] {
        [left, right] => (left.to_string(), right.to_string()),
        // No separator survives when the placeholder butts directly against
        // the other side's time token.
        [only] if only.starts_with(TIME_HOLD) && only.len() > TIME_HOLD.len() => {
            (TIME_HOLD.to_string(), only[TIME_HOLD.len()..].to_string())
        }
        [only] if only.ends_with(TIME_HOLD) && only.len() > TIME_HOLD.len() => {
            (only[..only.len() - TIME_HOLD.len()].to_string(), TIME_HOLD.to_string())
        }
        _ => return Err(ScraperError::TimeFormat(format!("invalid time range: {raw}"))),
    };

    if left.is_empty() || right.is_empty() {
        return Err(ScraperError::TimeFormat(format!("invalid time range: {raw}")));
    }

    let resolve_side = |side: &str| -> Result<TimePoint> {
        if side == TIME_HOLD {
            return Ok(TimePoint::NotRecorded);
        }
        Ok(TimePoint::At(official_start + parse_clock_offset(side)?))
    };

    Ok(CheckTime::Range {
        entry: resolve_side(&left)?,
        exit: resolve_side(&right)?,
    })
}

/// The calendar date of a spreadsheet timestamp, truncated to midnight UTC.
pub fn reference_midnight(stamp: NaiveDateTime) -> DateTime<Utc> {
    stamp
        .date()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
}

/// Re-anchors a spreadsheet timestamp: its offset from the reference
/// midnight is added to the true official start instant.
pub fn resolve_stamp(
    stamp: NaiveDateTime,
    official_start: DateTime<Utc>,
    reference: DateTime<Utc>,
) -> DateTime<Utc> {
    official_start + (stamp.and_utc() - reference)
}
