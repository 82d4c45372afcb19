use chrono::NaiveDate;
use thiserror::Error;

use super::Prayer;

/// Errors that can occur when validating or decoding schedule records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("{prayer} congregation time precedes its begin time on {date}")]
    JamahBeforeBegin { date: NaiveDate, prayer: Prayer },
    #[error("Invalid schedule key: {0}")]
    InvalidKey(String),
    #[error("Invalid schedule record at {key}: {reason}")]
    InvalidRecord { key: String, reason: String },
    #[error("Schedule collection must be an object")]
    NotAnObject,
}
