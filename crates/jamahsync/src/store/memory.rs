//! In-memory key-value store with LRU eviction.
//!
//! Always compiled: tests use it regardless of the selected backend.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use jamahsync_core::cache::{KeyValueStore, Result};

/// Default capacity; the pipeline itself only owns a handful of keys.
pub const DEFAULT_MAX_ENTRIES: usize = 64;

/// Thread-safe in-memory store.
///
/// Uses `Arc<RwLock<LruCache>>` so clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    store: Arc<RwLock<LruCache<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Creates a store holding at most `max_entries` keys.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // LruCache::get updates recency, so it needs the write lock.
        let mut store = self.store.write().await;
        Ok(store.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut store = self.store.write().await;
        store.put(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut store = self.store.write().await;
        store.pop(key);
        Ok(())
    }
}
