use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{mpsc, oneshot};

use crate::schedule::ScheduleRecord;

use super::{DateRange, Result};

/// Repository over the remote schedule collection, keyed by calendar date.
#[async_trait]
pub trait RemoteScheduleStore: Send + Sync {
    /// Gets every record in the collection.
    async fn get_all(&self) -> Result<Vec<ScheduleRecord>>;

    /// Gets the record for a single date.
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<ScheduleRecord>>;

    /// Gets all records inside an inclusive date range.
    async fn get_by_range(&self, range: DateRange) -> Result<Vec<ScheduleRecord>>;

    /// Creates or overwrites the record for its date.
    async fn write(&self, record: &ScheduleRecord) -> Result<()>;

    /// Writes many records. Backends with a native bulk API override this.
    async fn write_batch(&self, records: &[ScheduleRecord]) -> Result<()> {
        for record in records {
            self.write(record).await?;
        }
        Ok(())
    }

    /// Deletes the record for a date. Deleting a missing date succeeds.
    async fn delete(&self, date: NaiveDate) -> Result<()>;

    /// Opens a push subscription delivering full snapshots.
    async fn subscribe(&self) -> Result<RemoteSubscription>;

    /// Reports the store's connectivity flag.
    async fn is_online(&self) -> Result<bool>;
}

/// An open push subscription.
///
/// `updates` yields full snapshots as the remote collection changes.
/// Dropping every clone of `cancel` closes the channel as well.
#[derive(Debug)]
pub struct RemoteSubscription {
    pub updates: mpsc::Receiver<Vec<ScheduleRecord>>,
    pub cancel: CancelHandle,
}

/// Idempotent cancellation token for a subscription.
///
/// The producer side holds the receiver returned by [`CancelHandle::new`]
/// and releases its channel when it resolves, which happens exactly once.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl CancelHandle {
    /// Creates a handle and the receiver the producer waits on.
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (handle, rx)
    }

    /// Cancels the subscription.
    ///
    /// Returns true only for the call that actually released the channel.
    pub fn cancel(&self) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => {
                // The producer may already be gone; either way the channel is released.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
