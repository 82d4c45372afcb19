//! Persisted notification preferences.
//!
//! The store is the only writer of the preferences key. Every save is a
//! whole record and is announced on a watch channel so the lifecycle loop
//! can reschedule.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use jamahsync_core::cache::{
    deserialize_preferences, serialize_preferences, KeyValueStore, StoreError, PREFERENCES_KEY,
};
use jamahsync_core::notifications::NotificationPreferences;

use crate::error::Result;

/// Typed access to the persisted [`NotificationPreferences`].
pub struct PreferenceStore<S: KeyValueStore> {
    store: Arc<S>,
    changes: watch::Sender<NotificationPreferences>,
    /// Serializes read-modify-write cycles.
    update_lock: Mutex<()>,
}

impl<S: KeyValueStore> PreferenceStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        let (changes, _) = watch::channel(NotificationPreferences::default());
        Self {
            store,
            changes,
            update_lock: Mutex::new(()),
        }
    }

    /// Loads the persisted record, or the defaults when nothing was saved.
    ///
    /// Undecodable data reads as defaults. Loading refreshes the watched
    /// value without announcing a change.
    pub async fn load(&self) -> Result<NotificationPreferences> {
        let preferences = match self.store.get(PREFERENCES_KEY).await? {
            None => NotificationPreferences::default(),
            Some(bytes) => match deserialize_preferences(&bytes) {
                Ok(preferences) => preferences,
                Err(err) => {
                    tracing::warn!(error = %err, "Stored preferences unreadable, using defaults");
                    NotificationPreferences::default()
                }
            },
        };

        self.changes.send_if_modified(|current| {
            *current = preferences;
            false
        });
        Ok(preferences)
    }

    /// Persists `preferences` and announces the save.
    pub async fn save(&self, preferences: NotificationPreferences) -> Result<()> {
        let bytes = serialize_preferences(&preferences)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.set(PREFERENCES_KEY, &bytes).await?;

        tracing::debug!(
            enabled = preferences.is_enabled,
            begin = preferences.begin_times_enabled,
            congregation = preferences.congregation_times_enabled,
            lead = preferences.reminder_lead_minutes.minutes(),
            asked = preferences.has_asked_permission,
            "Preferences saved"
        );
        self.changes.send_replace(preferences);
        Ok(())
    }

    /// Builds the next record from the persisted one and saves it.
    pub async fn update<F>(&self, f: F) -> Result<NotificationPreferences>
    where
        F: FnOnce(NotificationPreferences) -> NotificationPreferences,
    {
        let _guard = self.update_lock.lock().await;
        let next = f(self.load().await?);
        self.save(next).await?;
        Ok(next)
    }

    /// The last loaded or saved record.
    pub fn current(&self) -> NotificationPreferences {
        *self.changes.borrow()
    }

    /// Watches saves.
    pub fn subscribe(&self) -> watch::Receiver<NotificationPreferences> {
        self.changes.subscribe()
    }
}
