use async_trait::async_trait;

use super::Result;

/// Persistent key-value storage on the device.
///
/// Each key has exactly one owning component; nothing writes another
/// component's keys directly.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Gets a value by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value, replacing any previous one.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Deletes a value. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}
