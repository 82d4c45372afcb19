use std::{env, time::Duration};

use crate::lifecycle::LifecycleConfig;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Schedule cache freshness window in seconds (default: 86,400)
    pub cache_ttl_seconds: u64,
    /// Days of alerts materialized ahead, starting today (default: 7)
    pub alert_horizon_days: u32,
    /// Delay between the language and notification setup steps (default: 300)
    pub setup_transition_delay_ms: u64,
    /// Debounce for foreground reschedules (default: 1,000)
    pub foreground_debounce_ms: u64,
    /// Maximum entries kept by the memory store (default: 64)
    pub store_max_entries: usize,
    /// Path to SQLite database file (default: "jamahsync.db")
    /// Note: Only used when the `sqlite` feature is enabled.
    pub sqlite_path: String,
    /// Base URL of the schedule API (default: "http://localhost:3000")
    pub remote_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CACHE_TTL_SECONDS` - Schedule cache TTL in seconds (default: 86,400)
    /// - `ALERT_HORIZON_DAYS` - Alert horizon in days (default: 7)
    /// - `SETUP_TRANSITION_DELAY_MS` - Setup step delay (default: 300)
    /// - `FOREGROUND_DEBOUNCE_MS` - Foreground debounce (default: 1,000)
    /// - `STORE_MAX_ENTRIES` - Memory store capacity (default: 64)
    /// - `SQLITE_PATH` - SQLite database path (default: "jamahsync.db")
    /// - `REMOTE_URL` - Schedule API base URL (default: "http://localhost:3000")
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            cache_ttl_seconds: lookup("CACHE_TTL_SECONDS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(86_400),
            alert_horizon_days: lookup("ALERT_HORIZON_DAYS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(7),
            setup_transition_delay_ms: lookup("SETUP_TRANSITION_DELAY_MS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(300),
            foreground_debounce_ms: lookup("FOREGROUND_DEBOUNCE_MS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(1_000),
            store_max_entries: lookup("STORE_MAX_ENTRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(64),
            sqlite_path: lookup("SQLITE_PATH").unwrap_or_else(|| "jamahsync.db".to_string()),
            remote_url: lookup("REMOTE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
        }
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Timings for the lifecycle task.
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            foreground_debounce: Duration::from_millis(self.foreground_debounce_ms),
            setup_transition_delay: Duration::from_millis(self.setup_transition_delay_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]);

        assert_eq!(config.cache_ttl_seconds, 86_400);
        assert_eq!(config.alert_horizon_days, 7);
        assert_eq!(config.setup_transition_delay_ms, 300);
        assert_eq!(config.foreground_debounce_ms, 1_000);
        assert_eq!(config.store_max_entries, 64);
        assert_eq!(config.sqlite_path, "jamahsync.db");
        assert_eq!(config.remote_url, "http://localhost:3000");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CACHE_TTL_SECONDS", "600"),
            ("ALERT_HORIZON_DAYS", "3"),
            ("REMOTE_URL", "https://schedule.example.org"),
        ]);

        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.alert_horizon_days, 3);
        assert_eq!(config.remote_url, "https://schedule.example.org");
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = config_from(&[("CACHE_TTL_SECONDS", "a day"), ("FOREGROUND_DEBOUNCE_MS", "-1")]);

        assert_eq!(config.cache_ttl_seconds, 86_400);
        assert_eq!(config.foreground_debounce_ms, 1_000);
    }

    #[test]
    fn test_every_numeric_key_parsed() {
        let config = config_from(&[
            ("SETUP_TRANSITION_DELAY_MS", " 450 "),
            ("FOREGROUND_DEBOUNCE_MS", "2000"),
            ("STORE_MAX_ENTRIES", "8"),
            ("ALERT_HORIZON_DAYS", "many"),
        ]);

        assert_eq!(config.setup_transition_delay_ms, 450);
        assert_eq!(config.foreground_debounce_ms, 2_000);
        assert_eq!(config.store_max_entries, 8);
        assert_eq!(config.alert_horizon_days, 7);
    }

    #[test]
    fn test_lifecycle_timings() {
        let config = config_from(&[("SETUP_TRANSITION_DELAY_MS", "250")]);
        let lifecycle = config.lifecycle();

        assert_eq!(lifecycle.setup_transition_delay, Duration::from_millis(250));
        assert_eq!(lifecycle.foreground_debounce, Duration::from_secs(1));
    }
}
