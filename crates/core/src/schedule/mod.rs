mod collection;
mod error;
mod mock_data;
mod operations;
mod sorting;
mod types;

pub use collection::{
    collection_from_records, connection_flag, date_key, parse_date_key, record_from_entry,
    records_from_collection, CONNECTION_KEY,
};
pub use error::ScheduleError;
pub use mock_data::{generate_schedule, sample_record};
pub use operations::{find_record, next_prayer, validate_record};
pub use sorting::{filter_records_by_date_range, forward_window, is_normalized, normalize_records};
pub use types::{Prayer, PrayerTime, ScheduleRecord, UpcomingPrayer};
