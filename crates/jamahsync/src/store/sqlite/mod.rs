//! SQLite store backend.
//!
//! Persists the key-value pairs in a single table using `rusqlite` for
//! synchronous operations and `tokio-rusqlite` for async wrapping.

mod error;
mod schema;
mod store;

pub use store::SqliteStore;
