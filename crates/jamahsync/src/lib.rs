//! Keeps a device's prayer-time schedule and reminders in sync.
//!
//! The shell around `jamahsync_core`: local stores, remote backends, the
//! sync and alert coordinators, and the lifecycle task that ties them
//! together.

pub mod alerts;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod local_cache;
pub mod output;
pub mod preferences;
pub mod remote;
pub mod scheduler;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{Result, SyncError};
pub use lifecycle::{AppState, LifecycleConfig, LifecycleCoordinator, LifecycleHandle};
pub use local_cache::LocalCache;
pub use preferences::PreferenceStore;
pub use scheduler::{NotificationScheduler, ReconcileReport};
pub use sync::{ScheduleSubscription, Snapshot, SyncCoordinator};
