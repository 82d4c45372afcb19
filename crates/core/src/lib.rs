//! Functional core of jamahsync.
//!
//! Domain types, pure algorithms, and the traits behind which the shell
//! plugs its persistence, remote, and device backends.

pub mod cache;
pub mod clock;
pub mod notifications;
pub mod schedule;
pub mod serde;
pub mod setup;
pub mod storage;
