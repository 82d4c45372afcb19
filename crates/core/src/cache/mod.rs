mod error;
mod keys;
mod serialization;
mod traits;
mod types;

pub use error::{Result, StoreError};
pub use keys::{PREFERENCES_KEY, SNAPSHOT_KEY, WRITTEN_AT_KEY};
pub use serialization::{
    deserialize_preferences, deserialize_snapshot, deserialize_timestamp, serialize_preferences,
    serialize_snapshot, serialize_timestamp, SerializationError,
};
pub use traits::KeyValueStore;
pub use types::{CacheEntry, CacheRead, DEFAULT_TTL};
