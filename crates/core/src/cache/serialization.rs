//! Pure functions for serializing domain types to and from stored bytes.
//!
//! Values are JSON so persisted state stays human-readable. Timestamps are
//! stored as decimal epoch milliseconds.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::notifications::NotificationPreferences;
use crate::schedule::ScheduleRecord;
use crate::serde::{from_epoch_millis, to_epoch_millis};

/// Errors that can occur during serialization/deserialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// Failed to serialize a value to bytes.
    #[error("Failed to serialize: {0}")]
    SerializeFailed(String),
    /// Failed to deserialize bytes to a value.
    #[error("Failed to deserialize: {0}")]
    DeserializeFailed(String),
}

/// Result type for serialization operations.
pub type Result<T> = std::result::Result<T, SerializationError>;

/// Serializes a schedule snapshot to JSON bytes.
pub fn serialize_snapshot(records: &[ScheduleRecord]) -> Result<Vec<u8>> {
    serde_json::to_vec(records).map_err(|e| SerializationError::SerializeFailed(e.to_string()))
}

/// Deserializes JSON bytes to a schedule snapshot.
pub fn deserialize_snapshot(bytes: &[u8]) -> Result<Vec<ScheduleRecord>> {
    serde_json::from_slice(bytes).map_err(|e| SerializationError::DeserializeFailed(e.to_string()))
}

/// Serializes an instant as epoch milliseconds.
pub fn serialize_timestamp(instant: DateTime<Utc>) -> Vec<u8> {
    to_epoch_millis(instant).to_string().into_bytes()
}

/// Deserializes epoch milliseconds to an instant.
pub fn deserialize_timestamp(bytes: &[u8]) -> Result<DateTime<Utc>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| SerializationError::DeserializeFailed(e.to_string()))?;
    let millis: i64 = text
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| SerializationError::DeserializeFailed(e.to_string()))?;
    from_epoch_millis(millis).ok_or_else(|| {
        SerializationError::DeserializeFailed(format!("timestamp out of range: {millis}"))
    })
}

/// Serializes notification preferences to JSON bytes.
pub fn serialize_preferences(preferences: &NotificationPreferences) -> Result<Vec<u8>> {
    serde_json::to_vec(preferences).map_err(|e| SerializationError::SerializeFailed(e.to_string()))
}

/// Deserializes JSON bytes to notification preferences.
pub fn deserialize_preferences(bytes: &[u8]) -> Result<NotificationPreferences> {
    serde_json::from_slice(bytes).map_err(|e| SerializationError::DeserializeFailed(e.to_string()))
}
