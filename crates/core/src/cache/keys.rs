/// Key holding the serialized schedule snapshot.
pub const SNAPSHOT_KEY: &str = "schedule:snapshot";

/// Key holding the snapshot's write timestamp (epoch milliseconds).
pub const WRITTEN_AT_KEY: &str = "schedule:written_at";

/// Key holding the serialized notification preferences.
pub const PREFERENCES_KEY: &str = "notification:preferences";
