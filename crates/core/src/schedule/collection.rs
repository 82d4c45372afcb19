//! Conversions between the remote collection shape and records.
//!
//! The remote collection is a JSON object keyed by `YYYY-MM-DD`, each value
//! holding the named timestamp fields of a day. Keys starting with `.` are
//! reserved; [`CONNECTION_KEY`] reports the store's connectivity.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::error::ScheduleError;
use super::sorting::normalize_records;
use super::types::ScheduleRecord;

/// Reserved key holding a boolean online/offline flag.
pub const CONNECTION_KEY: &str = ".info/connected";

/// Formats a date as a collection key.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a collection key into a date.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d")
        .map_err(|_| ScheduleError::InvalidKey(key.to_string()))
}

/// Decodes a single record stored under `key`.
///
/// The key is authoritative for the date; a `date` field inside the value is
/// optional and overwritten when present.
pub fn record_from_entry(key: &str, value: &Value) -> Result<ScheduleRecord, ScheduleError> {
    let date = parse_date_key(key)?;
    let mut object = match value {
        Value::Object(object) => object.clone(),
        _ => {
            return Err(ScheduleError::InvalidRecord {
                key: key.to_string(),
                reason: "expected an object".to_string(),
            })
        }
    };
    object.insert("date".to_string(), Value::String(date_key(date)));

    serde_json::from_value(Value::Object(object)).map_err(|e| ScheduleError::InvalidRecord {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Decodes a whole collection into a normalized, ascending snapshot.
pub fn records_from_collection(value: &Value) -> Result<Vec<ScheduleRecord>, ScheduleError> {
    let Value::Object(map) = value else {
        return Err(ScheduleError::NotAnObject);
    };

    let records = map
        .iter()
        .filter(|(key, _)| !key.starts_with('.'))
        .map(|(key, value)| record_from_entry(key, value))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(normalize_records(records))
}

/// Reads the reserved connectivity flag, if present.
pub fn connection_flag(value: &Value) -> Option<bool> {
    value.get(CONNECTION_KEY).and_then(Value::as_bool)
}

/// Encodes records into the keyed collection shape.
pub fn collection_from_records(records: &[ScheduleRecord]) -> Value {
    let mut map = Map::with_capacity(records.len());
    for record in records {
        if let Ok(Value::Object(mut object)) = serde_json::to_value(record) {
            object.remove("date");
            map.insert(date_key(record.date), Value::Object(object));
        }
    }
    Value::Object(map)
}
