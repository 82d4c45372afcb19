use chrono::{NaiveDate, NaiveDateTime};

use super::error::ScheduleError;
use super::types::{ScheduleRecord, UpcomingPrayer};

/// Validates a record before it is written to the remote store.
pub fn validate_record(record: &ScheduleRecord) -> Result<(), ScheduleError> {
    for (prayer, time) in record.prayers() {
        if time.jamah < time.begins {
            return Err(ScheduleError::JamahBeforeBegin {
                date: record.date,
                prayer,
            });
        }
    }
    Ok(())
}

/// Finds the record for a date in a normalized snapshot.
pub fn find_record(records: &[ScheduleRecord], date: NaiveDate) -> Option<&ScheduleRecord> {
    records
        .binary_search_by_key(&date, |r| r.date)
        .ok()
        .map(|idx| &records[idx])
}

/// Returns the first prayer beginning strictly after `now`.
///
/// Looks at `now`'s date and the following records, so the answer after
/// Isha is the next day's Fajr when that record is present.
pub fn next_prayer(records: &[ScheduleRecord], now: NaiveDateTime) -> Option<UpcomingPrayer> {
    records
        .iter()
        .filter(|r| r.date >= now.date())
        .flat_map(|r| {
            r.prayers().map(move |(prayer, _)| UpcomingPrayer {
                prayer,
                begins: r.begins_at(prayer),
                jamah: r.jamah_at(prayer),
            })
        })
        .find(|upcoming| upcoming.begins > now)
}
