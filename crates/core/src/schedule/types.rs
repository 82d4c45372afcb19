use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::serde::clock_time;

/// The five daily prayers, in the order they occur during the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prayer {
    Fajr,
    Zuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    /// All prayers in daily order.
    pub const ALL: [Prayer; 5] = [
        Prayer::Fajr,
        Prayer::Zuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    /// Returns the lowercase identifier used in keys and alert ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Prayer::Fajr => "fajr",
            Prayer::Zuhr => "zuhr",
            Prayer::Asr => "asr",
            Prayer::Maghrib => "maghrib",
            Prayer::Isha => "isha",
        }
    }

    /// Returns the display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Zuhr => "Zuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
        }
    }

    /// Parses the lowercase identifier.
    pub fn parse(s: &str) -> Option<Prayer> {
        Prayer::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Begin and congregation (jamah) time for a single prayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerTime {
    #[serde(with = "clock_time")]
    pub begins: NaiveTime,
    #[serde(with = "clock_time")]
    pub jamah: NaiveTime,
}

impl PrayerTime {
    pub fn new(begins: NaiveTime, jamah: NaiveTime) -> Self {
        Self { begins, jamah }
    }
}

/// One calendar day of prayer times.
///
/// Times are wall-clock local times; the schedule is pre-localized and no
/// timezone conversion is applied anywhere in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    /// Unique key of the record.
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub sunrise: NaiveTime,
    pub fajr: PrayerTime,
    pub zuhr: PrayerTime,
    pub asr: PrayerTime,
    pub maghrib: PrayerTime,
    pub isha: PrayerTime,
}

impl ScheduleRecord {
    /// Creates a record from times given in [`Prayer::ALL`] order.
    pub fn new(date: NaiveDate, sunrise: NaiveTime, times: [PrayerTime; 5]) -> Self {
        let [fajr, zuhr, asr, maghrib, isha] = times;
        Self {
            date,
            sunrise,
            fajr,
            zuhr,
            asr,
            maghrib,
            isha,
        }
    }

    /// Returns the times for a prayer.
    pub fn prayer(&self, prayer: Prayer) -> &PrayerTime {
        match prayer {
            Prayer::Fajr => &self.fajr,
            Prayer::Zuhr => &self.zuhr,
            Prayer::Asr => &self.asr,
            Prayer::Maghrib => &self.maghrib,
            Prayer::Isha => &self.isha,
        }
    }

    /// Iterates prayers with their times in daily order.
    pub fn prayers(&self) -> impl Iterator<Item = (Prayer, &PrayerTime)> + '_ {
        Prayer::ALL.into_iter().map(move |p| (p, self.prayer(p)))
    }

    /// The begin time of a prayer on this record's date.
    pub fn begins_at(&self, prayer: Prayer) -> NaiveDateTime {
        self.date.and_time(self.prayer(prayer).begins)
    }

    /// The congregation time of a prayer on this record's date.
    pub fn jamah_at(&self, prayer: Prayer) -> NaiveDateTime {
        self.date.and_time(self.prayer(prayer).jamah)
    }
}

/// The next prayer to begin after a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpcomingPrayer {
    pub prayer: Prayer,
    pub begins: NaiveDateTime,
    pub jamah: NaiveDateTime,
}
