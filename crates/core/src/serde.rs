//! Serde helpers for the wire and persisted formats.
//!
//! Schedule timestamps travel as wall-clock `HH:MM` strings and cache
//! timestamps are stored as integer epoch milliseconds.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Formats a wall-clock time as `HH:MM`.
/// Accepts `HH:MM` or `HH:MM:SS` when reading.
pub mod clock_time {
    use super::*;

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_clock_time(&s).map_err(serde::de::Error::custom)
    }
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M").or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
}

/// Converts an instant to epoch milliseconds.
pub fn to_epoch_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

/// Converts epoch milliseconds back to an instant.
///
/// Returns `None` for values chrono cannot represent.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
