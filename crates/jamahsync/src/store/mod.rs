//! Local key-value store backends.
//!
//! Concrete implementations of `jamahsync_core::cache::KeyValueStore`,
//! selected at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `memory` (default): in-process store, lost on exit
//! - `sqlite`: single-table SQLite store using `rusqlite` and `tokio-rusqlite`
//!
//! These features are mutually exclusive.

// Compile-time checks for mutual exclusivity
#[cfg(all(feature = "memory", feature = "sqlite"))]
compile_error!(
    "Features 'memory' and 'sqlite' are mutually exclusive. \
    Enable only one store backend at a time."
);

#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!(
    "No store backend selected. Enable 'memory' or 'sqlite' feature. \
    Example: cargo build -p jamahsync --no-default-features --features sqlite"
);

use jamahsync_core::cache::Result;

use crate::config::Config;

mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// The store backend chosen at compile time.
#[cfg(feature = "memory")]
pub type DeviceStore = MemoryStore;

/// The store backend chosen at compile time.
#[cfg(feature = "sqlite")]
pub type DeviceStore = SqliteStore;

/// Opens the configured device store.
#[cfg(feature = "memory")]
pub async fn open_device_store(config: &Config) -> Result<DeviceStore> {
    tracing::debug!(max_entries = config.store_max_entries, "Opening memory store");
    Ok(MemoryStore::new(config.store_max_entries))
}

/// Opens the configured device store.
#[cfg(feature = "sqlite")]
pub async fn open_device_store(config: &Config) -> Result<DeviceStore> {
    tracing::debug!(path = %config.sqlite_path, "Opening SQLite store");
    SqliteStore::new(&config.sqlite_path).await
}
