//! Remote schedule store backends.

mod http;
mod inmemory;
pub mod sse;

pub use http::HttpRemoteStore;
pub use inmemory::InMemoryRemoteStore;
