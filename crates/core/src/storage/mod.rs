mod error;
mod traits;
mod types;

pub use error::{DateRangeError, RemoteError, Result};
pub use traits::{CancelHandle, RemoteScheduleStore, RemoteSubscription};
pub use types::DateRange;
