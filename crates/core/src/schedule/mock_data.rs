//! Mock data generation for testing and demo mode.
//!
//! Pure functions producing plausible schedules. Times drift by a minute
//! every few days so consecutive records are distinguishable.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};

use super::types::{PrayerTime, ScheduleRecord};

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

/// Builds a single record for `date`.
///
/// # Example
///
/// ```
/// use jamahsync_core::schedule::{sample_record, Prayer};
/// use chrono::{NaiveDate, NaiveTime};
///
/// let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
/// let record = sample_record(date);
///
/// assert_eq!(record.date, date);
/// assert!(record.prayer(Prayer::Zuhr).jamah >= record.prayer(Prayer::Zuhr).begins);
/// ```
pub fn sample_record(date: NaiveDate) -> ScheduleRecord {
    let drift = Duration::minutes(i64::from(date.ordinal() % 30) / 3);
    let shifted = |h: u32, m: u32| time(h, m) + drift;

    ScheduleRecord::new(
        date,
        shifted(4, 45),
        [
            PrayerTime::new(shifted(3, 0), shifted(3, 30)),
            PrayerTime::new(time(13, 0), time(13, 15)),
            PrayerTime::new(shifted(17, 30), time(18, 0)),
            PrayerTime::new(shifted(21, 5), shifted(21, 10)),
            PrayerTime::new(shifted(22, 30), time(23, 0)),
        ],
    )
}

/// Generates `days` consecutive records starting at `start`.
///
/// # Example
///
/// ```
/// use jamahsync_core::schedule::generate_schedule;
/// use chrono::NaiveDate;
///
/// let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
/// let schedule = generate_schedule(start, 30);
///
/// assert_eq!(schedule.len(), 30);
/// assert_eq!(schedule[29].date, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
/// ```
pub fn generate_schedule(start: NaiveDate, days: u32) -> Vec<ScheduleRecord> {
    (0..days)
        .map(|offset| sample_record(start + Duration::days(i64::from(offset))))
        .collect()
}
