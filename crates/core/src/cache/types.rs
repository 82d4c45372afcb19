use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::schedule::ScheduleRecord;

/// Freshness window of the schedule snapshot.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A persisted schedule snapshot and the instant it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Records in ascending date order.
    pub snapshot: Vec<ScheduleRecord>,
    pub written_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Returns the entry's age at `now`. Entries from the future have age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.written_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns true while the entry's age does not exceed `ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) <= ttl
    }
}

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRead {
    pub snapshot: Vec<ScheduleRecord>,
    pub written_at: DateTime<Utc>,
    pub is_fresh: bool,
}
