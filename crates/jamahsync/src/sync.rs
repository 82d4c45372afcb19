//! Cache-vs-remote orchestration of the schedule.
//!
//! Reads go cache-aside with a stale fallback, pushes are written through
//! to the cache, and mutations invalidate the cache after the remote write
//! succeeds. The most recently resolved schedule is published on a watch
//! channel for consumers that only want the current value.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::{mpsc, watch};

use jamahsync_core::cache::KeyValueStore;
use jamahsync_core::clock::Clock;
use jamahsync_core::schedule::{
    filter_records_by_date_range, find_record, next_prayer, normalize_records, validate_record,
    ScheduleRecord, UpcomingPrayer,
};
use jamahsync_core::storage::{CancelHandle, DateRange, RemoteScheduleStore};

use crate::error::{Result, SyncError};
use crate::local_cache::LocalCache;

/// Shared, immutable schedule snapshot.
pub type Snapshot = Arc<Vec<ScheduleRecord>>;

/// Buffered snapshots per consumer.
const SUBSCRIPTION_CAPACITY: usize = 16;

/// Orchestrates the remote store and the local cache.
///
/// # Type Parameters
///
/// * `R` - The remote schedule store
/// * `S` - The device key-value store backing the cache
pub struct SyncCoordinator<R, S>
where
    R: RemoteScheduleStore,
    S: KeyValueStore,
{
    remote: Arc<R>,
    cache: Arc<LocalCache<S>>,
    clock: Arc<dyn Clock>,
    current: Arc<watch::Sender<Option<Snapshot>>>,
}

impl<R, S> SyncCoordinator<R, S>
where
    R: RemoteScheduleStore + 'static,
    S: KeyValueStore + 'static,
{
    /// Creates a coordinator owning `cache`.
    pub fn new(remote: Arc<R>, cache: LocalCache<S>, clock: Arc<dyn Clock>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            remote,
            cache: Arc::new(cache),
            clock,
            current: Arc::new(current),
        }
    }

    /// The cache this coordinator owns.
    pub fn cache(&self) -> &LocalCache<S> {
        &self.cache
    }

    /// Watches the most recently resolved schedule.
    ///
    /// Holds `None` until the first successful read or push.
    pub fn current(&self) -> watch::Receiver<Option<Snapshot>> {
        self.current.subscribe()
    }

    /// Returns the whole schedule in ascending date order.
    ///
    /// A fresh cache answers directly. Otherwise the remote store is asked
    /// and the result written through. When the remote store is unreachable
    /// the last cached snapshot is served regardless of age, and only when
    /// that is missing too does the call fail with [`SyncError::CacheMiss`].
    pub async fn get_all(&self) -> Result<Vec<ScheduleRecord>> {
        match self.cache.read(false).await {
            Ok(Some(read)) => {
                tracing::trace!(records = read.snapshot.len(), "Cache hit for schedule");
                publish(&self.current, &read.snapshot);
                return Ok(read.snapshot);
            }
            Ok(None) => tracing::trace!("Cache miss for schedule"),
            Err(err) => tracing::warn!(error = %err, "Cache read failed"),
        }

        // Stamp the snapshot with the instant the request started so a push
        // landing meanwhile is not overwritten by this older response.
        let fetched_at = self.clock.now();

        let records = match self.remote.get_all().await {
            Ok(records) => normalize_records(records),
            Err(err) if err.is_unavailable() => return self.fall_back(err.to_string()).await,
            Err(err) => return Err(SyncError::from_remote_read(err)),
        };

        match self.cache.write_at(records.clone(), fetched_at).await {
            Ok(()) => {}
            Err(SyncError::StaleWriteRejected { attempted, current }) => {
                tracing::debug!(%attempted, %current, "Remote response older than cached schedule");
                if let Ok(Some(read)) = self.cache.read(true).await {
                    publish(&self.current, &read.snapshot);
                    return Ok(read.snapshot);
                }
            }
            Err(err) => tracing::warn!(error = %err, "Failed to cache schedule"),
        }

        publish(&self.current, &records);
        Ok(records)
    }

    async fn fall_back(&self, remote_error: String) -> Result<Vec<ScheduleRecord>> {
        tracing::warn!(error = %remote_error, "Remote unavailable, falling back to cached schedule");

        match self.cache.read(true).await {
            Ok(Some(read)) => {
                tracing::debug!(
                    written_at = %read.written_at,
                    fresh = read.is_fresh,
                    "Serving cached schedule"
                );
                publish(&self.current, &read.snapshot);
                Ok(read.snapshot)
            }
            Ok(None) => Err(SyncError::CacheMiss(remote_error)),
            Err(err) => {
                tracing::warn!(error = %err, "Cache fallback read failed");
                Err(SyncError::CacheMiss(remote_error))
            }
        }
    }

    /// Reads a single date straight from the remote store.
    pub async fn get_by_date(&self, date: NaiveDate) -> Result<Option<ScheduleRecord>> {
        self.remote
            .get_by_date(date)
            .await
            .map_err(SyncError::from_remote_read)
    }

    /// Reads an inclusive date range straight from the remote store.
    ///
    /// The result is never written to the cache; a partial schedule must not
    /// replace the full snapshot.
    pub async fn get_by_range(&self, range: DateRange) -> Result<Vec<ScheduleRecord>> {
        let records = self
            .remote
            .get_by_range(range)
            .await
            .map_err(SyncError::from_remote_read)?;
        Ok(filter_records_by_date_range(
            &normalize_records(records),
            range,
        ))
    }

    /// Today's record from the resolved schedule.
    pub async fn today(&self, now: NaiveDateTime) -> Result<Option<ScheduleRecord>> {
        let records = self.get_all().await?;
        Ok(find_record(&records, now.date()).cloned())
    }

    /// The next prayer beginning after `now`.
    pub async fn next_prayer(&self, now: NaiveDateTime) -> Result<Option<UpcomingPrayer>> {
        let records = self.get_all().await?;
        Ok(next_prayer(&records, now))
    }

    /// Reports remote connectivity. Failing to ask counts as offline.
    pub async fn is_online(&self) -> bool {
        match self.remote.is_online().await {
            Ok(online) => online,
            Err(err) => {
                tracing::debug!(error = %err, "Connectivity check failed");
                false
            }
        }
    }

    /// Creates or overwrites one day's record.
    pub async fn update_prayer_time(&self, record: ScheduleRecord) -> Result<()> {
        validate_record(&record)?;

        self.remote
            .write(&record)
            .await
            .map_err(SyncError::from_remote_write)?;

        tracing::info!(date = %record.date, "Schedule record updated");
        self.invalidate().await;
        Ok(())
    }

    /// Writes many records at once, invalidating the cache once.
    ///
    /// Every record is validated before anything is written.
    pub async fn batch_update(&self, records: Vec<ScheduleRecord>) -> Result<()> {
        for record in &records {
            validate_record(record)?;
        }
        let records = normalize_records(records);

        self.remote
            .write_batch(&records)
            .await
            .map_err(SyncError::from_remote_write)?;

        tracing::info!(count = records.len(), "Schedule batch updated");
        self.invalidate().await;
        Ok(())
    }

    /// Deletes one day's record.
    pub async fn delete(&self, date: NaiveDate) -> Result<()> {
        self.remote
            .delete(date)
            .await
            .map_err(SyncError::from_remote_write)?;

        tracing::info!(%date, "Schedule record deleted");
        self.invalidate().await;
        Ok(())
    }

    async fn invalidate(&self) {
        if let Err(err) = self.cache.invalidate().await {
            tracing::warn!(error = %err, "Failed to invalidate schedule cache");
        }
    }

    /// Opens a push subscription.
    ///
    /// Every snapshot pushed by the remote store is sorted, written through
    /// to the cache, published on [`current`](Self::current), and delivered
    /// to the returned subscription.
    pub async fn subscribe(&self) -> Result<ScheduleSubscription> {
        let remote = self
            .remote
            .subscribe()
            .await
            .map_err(SyncError::from_remote_read)?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let cancel = remote.cancel.clone();
        let mut updates = remote.updates;
        let remote_cancel = remote.cancel;

        let cache = Arc::clone(&self.cache);
        let clock = Arc::clone(&self.clock);
        let current = Arc::clone(&self.current);

        tokio::spawn(async move {
            while let Some(records) = updates.recv().await {
                if remote_cancel.is_cancelled() {
                    break;
                }

                let records = normalize_records(records);
                let pushed_at = clock.now();

                match cache.write_at(records.clone(), pushed_at).await {
                    Ok(()) => {}
                    Err(SyncError::StaleWriteRejected { attempted, current }) => {
                        tracing::debug!(%attempted, %current, "Push older than cached schedule");
                    }
                    Err(err) => tracing::warn!(error = %err, "Failed to cache pushed schedule"),
                }

                let snapshot = publish(&current, &records);
                if tx.send(snapshot).await.is_err() {
                    // Consumer went away without unsubscribing.
                    remote_cancel.cancel();
                    break;
                }
            }
            tracing::debug!("Schedule subscription closed");
        });

        Ok(ScheduleSubscription {
            updates: rx,
            cancel,
        })
    }
}

/// Publishes a snapshot unless it equals the current one.
fn publish(current: &watch::Sender<Option<Snapshot>>, records: &[ScheduleRecord]) -> Snapshot {
    let mut snapshot = None;
    current.send_if_modified(|value| {
        if let Some(existing) = value.as_ref().filter(|e| e.as_slice() == records) {
            snapshot = Some(Arc::clone(existing));
            return false;
        }
        let fresh = Arc::new(records.to_vec());
        snapshot = Some(Arc::clone(&fresh));
        *value = Some(fresh);
        true
    });
    snapshot.unwrap_or_else(|| Arc::new(records.to_vec()))
}

/// Stream of pushed schedule snapshots.
///
/// Nothing is delivered once [`unsubscribe`](Self::unsubscribe) returns.
#[derive(Debug)]
pub struct ScheduleSubscription {
    updates: mpsc::Receiver<Snapshot>,
    cancel: CancelHandle,
}

impl ScheduleSubscription {
    /// Waits for the next snapshot. Returns `None` once unsubscribed or
    /// when the remote channel closes.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let snapshot = self.updates.recv().await?;
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(snapshot)
    }

    /// Releases the remote channel. Safe to call repeatedly; returns true
    /// only for the call that released it.
    pub fn unsubscribe(&self) -> bool {
        let released = self.cancel.cancel();
        if released {
            tracing::debug!("Unsubscribed from schedule pushes");
        }
        released
    }

    /// A handle that can unsubscribe from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}
