//! In-memory remote store.
//!
//! Stands in for the shared remote collection in tests and demo mode.
//! Every mutation broadcasts the full snapshot to open subscriptions, and
//! the connectivity flag can be flipped to simulate an outage.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{broadcast, mpsc, RwLock};

use jamahsync_core::schedule::{date_key, ScheduleRecord};
use jamahsync_core::storage::{
    CancelHandle, DateRange, RemoteError, RemoteScheduleStore, RemoteSubscription, Result,
};

/// Channel capacity for snapshot fan-out.
const CHANNEL_CAPACITY: usize = 16;

/// In-memory remote collection keyed by date.
#[derive(Debug, Clone)]
pub struct InMemoryRemoteStore {
    records: Arc<RwLock<BTreeMap<NaiveDate, ScheduleRecord>>>,
    updates: broadcast::Sender<Vec<ScheduleRecord>>,
    online: Arc<AtomicBool>,
    reject_writes: Arc<AtomicBool>,
    open_channels: Arc<AtomicUsize>,
    released_channels: Arc<AtomicUsize>,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    /// Creates an empty, online store.
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            updates,
            online: Arc::new(AtomicBool::new(true)),
            reject_writes: Arc::new(AtomicBool::new(false)),
            open_channels: Arc::new(AtomicUsize::new(0)),
            released_channels: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates an online store holding `records`.
    pub fn with_records(records: Vec<ScheduleRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.records.try_write() {
            map.extend(records.into_iter().map(|r| (r.date, r)));
        }
        store
    }

    /// Simulates connectivity changes.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        tracing::debug!(online, "Remote connectivity changed");
    }

    /// Makes writes and deletes fail while set.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Number of subscription channels currently open.
    pub fn open_channels(&self) -> usize {
        self.open_channels.load(Ordering::SeqCst)
    }

    /// Number of subscription channels released so far.
    pub fn released_channels(&self) -> usize {
        self.released_channels.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("remote store offline".to_string()))
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_online()?;
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::WriteFailed("write rejected".to_string()));
        }
        Ok(())
    }

    async fn snapshot(&self) -> Vec<ScheduleRecord> {
        self.records.read().await.values().cloned().collect()
    }

    async fn publish(&self) {
        let snapshot = self.snapshot().await;
        // No receivers just means nobody is subscribed.
        let _ = self.updates.send(snapshot);
    }
}

#[async_trait]
impl RemoteScheduleStore for InMemoryRemoteStore {
    async fn get_all(&self) -> Result<Vec<ScheduleRecord>> {
        self.ensure_online()?;
        Ok(self.snapshot().await)
    }

    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<ScheduleRecord>> {
        self.ensure_online()?;
        Ok(self.records.read().await.get(&date).cloned())
    }

    async fn get_by_range(&self, range: DateRange) -> Result<Vec<ScheduleRecord>> {
        self.ensure_online()?;
        Ok(self
            .records
            .read()
            .await
            .range(range.start..=range.end)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn write(&self, record: &ScheduleRecord) -> Result<()> {
        self.ensure_writable()?;
        self.records
            .write()
            .await
            .insert(record.date, record.clone());
        tracing::debug!(date = %date_key(record.date), "Remote record written");
        self.publish().await;
        Ok(())
    }

    async fn write_batch(&self, records: &[ScheduleRecord]) -> Result<()> {
        self.ensure_writable()?;
        {
            let mut map = self.records.write().await;
            for record in records {
                map.insert(record.date, record.clone());
            }
        }
        tracing::debug!(count = records.len(), "Remote batch written");
        self.publish().await;
        Ok(())
    }

    async fn delete(&self, date: NaiveDate) -> Result<()> {
        self.ensure_writable()?;
        self.records.write().await.remove(&date);
        tracing::debug!(date = %date_key(date), "Remote record deleted");
        self.publish().await;
        Ok(())
    }

    async fn subscribe(&self) -> Result<RemoteSubscription> {
        self.ensure_online()?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (cancel, mut cancelled) = CancelHandle::new();
        let mut broadcast_rx = self.updates.subscribe();

        // Subscribers receive the current value first.
        let initial = self.snapshot().await;
        let _ = tx.send(initial).await;

        let store = self.clone();
        store.open_channels.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    update = broadcast_rx.recv() => match update {
                        Ok(snapshot) => {
                            if tx.send(snapshot).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Subscriber lagged, resending snapshot");
                            if tx.send(store.snapshot().await).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            store.open_channels.fetch_sub(1, Ordering::SeqCst);
            store.released_channels.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("Remote subscription channel released");
        });

        Ok(RemoteSubscription {
            updates: rx,
            cancel,
        })
    }

    async fn is_online(&self) -> Result<bool> {
        Ok(self.online.load(Ordering::SeqCst))
    }
}
