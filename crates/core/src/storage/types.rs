use chrono::{Duration, NaiveDate};

use super::DateRangeError;

/// A date range with inclusive start and end dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new date range, validating that start <= end.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    /// A range covering a single day.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// A range of `days` consecutive days starting at `start`.
    ///
    /// `days == 0` is treated as a single day.
    pub fn forward(start: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.saturating_sub(1));
        Self {
            start,
            end: start + Duration::days(span),
        }
    }

    /// Returns true if `date` lies inside the range (inclusive).
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
