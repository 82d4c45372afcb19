//! Error taxonomy of the synchronization and scheduling pipeline.

use chrono::{DateTime, Utc};
use thiserror::Error;

use jamahsync_core::cache::StoreError;
use jamahsync_core::schedule::ScheduleError;
use jamahsync_core::storage::RemoteError;

/// Errors surfaced by the coordinators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The remote store could not be reached.
    #[error("Remote schedule unavailable: {0}")]
    RemoteUnavailable(String),
    /// The remote store failed and no local snapshot exists to fall back on.
    #[error("No schedule available: remote failed ({0}) and nothing is cached")]
    CacheMiss(String),
    /// The device refused notification permission.
    #[error("Notification permission denied")]
    PermissionDenied,
    /// A cache write carried an older timestamp than the stored snapshot.
    #[error("Stale cache write rejected: snapshot from {attempted} is older than {current}")]
    StaleWriteRejected {
        attempted: DateTime<Utc>,
        current: DateTime<Utc>,
    },
    /// A remote write or delete failed.
    #[error("Schedule write failed: {0}")]
    ScheduleWriteFailure(String),
    /// The remote store returned data that could not be decoded.
    #[error("Invalid remote data: {0}")]
    InvalidRemoteData(String),
    /// A record failed validation before being written.
    #[error(transparent)]
    InvalidRecord(#[from] ScheduleError),
    /// Local persistence failed.
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Maps a remote failure on a read path.
    pub fn from_remote_read(err: RemoteError) -> Self {
        match err {
            RemoteError::Unavailable(msg) => SyncError::RemoteUnavailable(msg),
            RemoteError::InvalidData(msg) => SyncError::InvalidRemoteData(msg),
            RemoteError::WriteFailed(msg) => SyncError::RemoteUnavailable(msg),
        }
    }

    /// Maps a remote failure on a write path.
    pub fn from_remote_write(err: RemoteError) -> Self {
        SyncError::ScheduleWriteFailure(err.to_string())
    }
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_remote_read_mapping() {
        assert_eq!(
            SyncError::from_remote_read(RemoteError::Unavailable("offline".to_string())),
            SyncError::RemoteUnavailable("offline".to_string())
        );
        assert_eq!(
            SyncError::from_remote_read(RemoteError::InvalidData("bad".to_string())),
            SyncError::InvalidRemoteData("bad".to_string())
        );
    }

    #[test]
    fn test_remote_write_mapping() {
        let error = SyncError::from_remote_write(RemoteError::Unavailable("offline".to_string()));
        assert_eq!(
            error,
            SyncError::ScheduleWriteFailure("Remote store unavailable: offline".to_string())
        );
    }

    #[test]
    fn test_cache_miss_display() {
        let error = SyncError::CacheMiss("Remote store unavailable: offline".to_string());
        assert_eq!(
            error.to_string(),
            "No schedule available: remote failed (Remote store unavailable: offline) and nothing is cached"
        );
    }

    #[test]
    fn test_stale_write_display() {
        let current = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let attempted = current - chrono::Duration::seconds(5);
        let error = SyncError::StaleWriteRejected { attempted, current };
        assert!(error.to_string().starts_with("Stale cache write rejected"));
    }

    #[test]
    fn test_store_error_converts() {
        let error: SyncError = StoreError::OperationFailed("disk full".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Local store error: Store operation failed: disk full"
        );
    }
}
