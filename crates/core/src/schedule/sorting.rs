use chrono::{Duration, NaiveDate};

use super::types::ScheduleRecord;
use crate::storage::DateRange;

/// Sorts records ascending by date and keeps one record per date.
///
/// When a date appears more than once the last occurrence wins, matching
/// the remote store's last-write-wins semantics.
pub fn normalize_records(mut records: Vec<ScheduleRecord>) -> Vec<ScheduleRecord> {
    // Stable sort keeps insertion order among equal dates.
    records.sort_by_key(|r| r.date);

    let mut normalized: Vec<ScheduleRecord> = Vec::with_capacity(records.len());
    for record in records {
        match normalized.last_mut() {
            Some(last) if last.date == record.date => *last = record,
            _ => normalized.push(record),
        }
    }
    normalized
}

/// Returns true if the records are strictly ascending by date.
pub fn is_normalized(records: &[ScheduleRecord]) -> bool {
    records.windows(2).all(|pair| pair[0].date < pair[1].date)
}

/// Filters records whose date falls inside the inclusive range.
pub fn filter_records_by_date_range(
    records: &[ScheduleRecord],
    range: DateRange,
) -> Vec<ScheduleRecord> {
    records
        .iter()
        .filter(|r| range.contains(r.date))
        .cloned()
        .collect()
}

/// Returns the records for `days` consecutive days starting at `start`.
pub fn forward_window(
    records: &[ScheduleRecord],
    start: NaiveDate,
    days: u32,
) -> Vec<&ScheduleRecord> {
    let end = start + Duration::days(i64::from(days));
    records
        .iter()
        .filter(|r| r.date >= start && r.date < end)
        .collect()
}
