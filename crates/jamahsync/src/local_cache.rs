//! Time-bounded local snapshot of the schedule.
//!
//! The snapshot and its write timestamp live under two keys of the device
//! store. A tokio mutex serializes every operation so callers never observe
//! a snapshot paired with another write's timestamp.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use jamahsync_core::cache::{
    deserialize_snapshot, deserialize_timestamp, serialize_snapshot, serialize_timestamp,
    CacheEntry, CacheRead, KeyValueStore, StoreError, SNAPSHOT_KEY, WRITTEN_AT_KEY,
};
use jamahsync_core::clock::Clock;
use jamahsync_core::schedule::{normalize_records, ScheduleRecord};

use crate::error::{Result, SyncError};

/// Owner of the persisted schedule snapshot.
pub struct LocalCache<S: KeyValueStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    /// Writes older than this instant are rejected, even after invalidation
    /// removed the stored timestamp.
    floor: Mutex<Option<DateTime<Utc>>>,
}

impl<S: KeyValueStore> LocalCache<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            floor: Mutex::new(None),
        }
    }

    /// Reads the snapshot.
    ///
    /// Without `ignore_expiry`, a snapshot older than the TTL reads as absent.
    /// With it, the last snapshot is returned regardless of age.
    pub async fn read(&self, ignore_expiry: bool) -> Result<Option<CacheRead>> {
        let _guard = self.floor.lock().await;

        let Some(entry) = self.load_entry().await? else {
            tracing::trace!("Cache empty");
            return Ok(None);
        };

        let is_fresh = entry.is_fresh(self.clock.now(), self.ttl);
        if !is_fresh && !ignore_expiry {
            tracing::trace!(written_at = %entry.written_at, "Cache entry expired");
            return Ok(None);
        }

        Ok(Some(CacheRead {
            snapshot: entry.snapshot,
            written_at: entry.written_at,
            is_fresh,
        }))
    }

    /// Stores a snapshot stamped with the current time.
    pub async fn write(&self, snapshot: Vec<ScheduleRecord>) -> Result<DateTime<Utc>> {
        let now = self.clock.now();
        self.write_at(snapshot, now).await?;
        Ok(now)
    }

    /// Stores a snapshot stamped with `written_at`.
    ///
    /// Fails with [`SyncError::StaleWriteRejected`] if a snapshot with a newer
    /// timestamp is already stored, or the cache was invalidated after
    /// `written_at`.
    pub async fn write_at(
        &self,
        snapshot: Vec<ScheduleRecord>,
        written_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut floor = self.floor.lock().await;

        let current = match self.load_written_at().await? {
            Some(stored) => Some(floor.map_or(stored, |f| f.max(stored))),
            None => *floor,
        };
        if let Some(current) = current {
            if written_at < current {
                return Err(SyncError::StaleWriteRejected {
                    attempted: written_at,
                    current,
                });
            }
        }

        let snapshot = normalize_records(snapshot);
        let bytes =
            serialize_snapshot(&snapshot).map_err(|e| StoreError::Serialization(e.to_string()))?;

        // The floor keeps rejecting older writes while the timestamp is gone,
        // and a snapshot without its timestamp reads as absent.
        *floor = current;
        self.store.delete(WRITTEN_AT_KEY).await?;
        self.store.set(SNAPSHOT_KEY, &bytes).await?;
        self.store
            .set(WRITTEN_AT_KEY, &serialize_timestamp(written_at))
            .await?;

        tracing::debug!(records = snapshot.len(), %written_at, "Cache written");
        Ok(())
    }

    /// Clears the snapshot and its timestamp.
    ///
    /// Writes stamped before this call are rejected afterwards.
    pub async fn invalidate(&self) -> Result<()> {
        let mut floor = self.floor.lock().await;

        self.store.delete(SNAPSHOT_KEY).await?;
        self.store.delete(WRITTEN_AT_KEY).await?;

        let now = self.clock.now();
        *floor = Some(floor.map_or(now, |f| f.max(now)));

        tracing::debug!("Cache invalidated");
        Ok(())
    }

    async fn load_written_at(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(bytes) = self.store.get(WRITTEN_AT_KEY).await? else {
            return Ok(None);
        };
        match deserialize_timestamp(&bytes) {
            Ok(instant) => Ok(Some(instant)),
            Err(err) => {
                tracing::warn!(error = %err, "Cache timestamp unreadable");
                Ok(None)
            }
        }
    }

    async fn load_entry(&self) -> Result<Option<CacheEntry>> {
        let Some(written_at) = self.load_written_at().await? else {
            return Ok(None);
        };
        let Some(bytes) = self.store.get(SNAPSHOT_KEY).await? else {
            return Ok(None);
        };

        match deserialize_snapshot(&bytes) {
            Ok(snapshot) => Ok(Some(CacheEntry {
                snapshot: normalize_records(snapshot),
                written_at,
            })),
            Err(err) => {
                // Treat undecodable data as a miss.
                tracing::warn!(error = %err, "Cache snapshot deserialization failed");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicBool, Ordering};
    use jamahsync_core::cache::DEFAULT_TTL;
    use jamahsync_core::clock::ManualClock;
    use jamahsync_core::schedule::{generate_schedule, sample_record};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn schedule(days: u32) -> Vec<ScheduleRecord> {
        generate_schedule(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), days)
    }

    fn setup() -> (LocalCache<MemoryStore>, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(ManualClock::new(start()));
        let cache = LocalCache::new(store.clone(), clock.clone(), DEFAULT_TTL);
        (cache, store, clock)
    }

    #[tokio::test]
    async fn test_read_empty() {
        let (cache, _, _) = setup();
        assert!(cache.read(false).await.unwrap().is_none());
        assert!(cache.read(true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fresh_within_ttl() {
        let (cache, _, clock) = setup();
        cache.write(schedule(3)).await.unwrap();

        clock.advance(chrono::Duration::hours(23) + chrono::Duration::minutes(59));

        let read = cache.read(false).await.unwrap().unwrap();
        assert!(read.is_fresh);
        assert_eq!(read.snapshot.len(), 3);
        assert_eq!(read.written_at, start());
    }

    #[tokio::test]
    async fn test_expired_reads_absent_unless_ignored() {
        let (cache, _, clock) = setup();
        cache.write(schedule(3)).await.unwrap();

        clock.advance(chrono::Duration::hours(24) + chrono::Duration::minutes(1));

        assert!(cache.read(false).await.unwrap().is_none());
        let stale = cache.read(true).await.unwrap().unwrap();
        assert!(!stale.is_fresh);
        assert_eq!(stale.snapshot, schedule(3));
    }

    #[tokio::test]
    async fn test_snapshot_sorted_on_read() {
        let (cache, _, _) = setup();
        let mut records = schedule(5);
        records.reverse();

        cache.write(records).await.unwrap();

        let read = cache.read(false).await.unwrap().unwrap();
        assert_eq!(read.snapshot, schedule(5));
    }

    #[tokio::test]
    async fn test_older_write_rejected() {
        let (cache, _, _) = setup();
        cache.write_at(schedule(2), start()).await.unwrap();

        let result = cache
            .write_at(schedule(5), start() - chrono::Duration::seconds(1))
            .await;

        assert!(matches!(
            result,
            Err(SyncError::StaleWriteRejected { current, .. }) if current == start()
        ));
        assert_eq!(cache.read(false).await.unwrap().unwrap().snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_equal_timestamp_write_accepted() {
        let (cache, _, _) = setup();
        cache.write_at(schedule(2), start()).await.unwrap();
        cache.write_at(schedule(4), start()).await.unwrap();
        assert_eq!(cache.read(false).await.unwrap().unwrap().snapshot.len(), 4);
    }

    #[tokio::test]
    async fn test_invalidate_clears_and_sets_floor() {
        let (cache, store, clock) = setup();
        cache.write(schedule(2)).await.unwrap();
        clock.advance(chrono::Duration::minutes(5));

        cache.invalidate().await.unwrap();

        assert!(cache.read(true).await.unwrap().is_none());
        assert!(store.is_empty().await);

        // A fetch that started before the invalidation must not repopulate.
        let result = cache.write_at(schedule(2), start()).await;
        assert!(matches!(result, Err(SyncError::StaleWriteRejected { .. })));

        clock.advance(chrono::Duration::minutes(1));
        assert!(cache.write(schedule(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_reads_absent() {
        let (cache, store, _) = setup();
        cache.write(vec![sample_record(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())])
            .await
            .unwrap();

        store.set(SNAPSHOT_KEY, b"{not json").await.unwrap();

        assert!(cache.read(true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timestamp_persisted_as_epoch_millis() {
        let (cache, store, _) = setup();
        cache.write(schedule(1)).await.unwrap();

        let raw = store.get(WRITTEN_AT_KEY).await.unwrap().unwrap();
        assert_eq!(
            String::from_utf8(raw).unwrap(),
            start().timestamp_millis().to_string()
        );
    }

    /// Memory store whose timestamp writes can be made to fail.
    #[derive(Default)]
    struct FailingTimestampStore {
        inner: MemoryStore,
        fail_timestamp: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FailingTimestampStore {
        async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8]) -> std::result::Result<(), StoreError> {
            if key == WRITTEN_AT_KEY && self.fail_timestamp.load(Ordering::SeqCst) {
                return Err(StoreError::OperationFailed("disk full".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> std::result::Result<(), StoreError> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_interrupted_write_reads_absent() {
        let store = Arc::new(FailingTimestampStore::default());
        let clock = Arc::new(ManualClock::new(start()));
        let cache = LocalCache::new(store.clone(), clock.clone(), DEFAULT_TTL);
        cache.write(schedule(1)).await.unwrap();

        clock.advance(chrono::Duration::hours(1));
        store.fail_timestamp.store(true, Ordering::SeqCst);
        let result = cache.write(schedule(3)).await;
        assert!(matches!(result, Err(SyncError::Store(_))));

        // The new snapshot is never paired with the old timestamp.
        assert!(cache.read(true).await.unwrap().is_none());

        // Older writes are still rejected without the stored timestamp.
        store.fail_timestamp.store(false, Ordering::SeqCst);
        let stale = cache
            .write_at(schedule(2), start() - chrono::Duration::seconds(1))
            .await;
        assert!(matches!(stale, Err(SyncError::StaleWriteRejected { .. })));

        let written_at = cache.write(schedule(4)).await.unwrap();
        let read = cache.read(false).await.unwrap().unwrap();
        assert_eq!(read.snapshot.len(), 4);
        assert_eq!(read.written_at, written_at);
    }
}
