//! Reconciles device alerts with the schedule and preferences.
//!
//! The desired set is computed purely; only the diff against what the
//! device has registered turns into facility calls. A failure on one
//! identity is logged and counted, never allowed to stop the rest.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::Mutex;

use jamahsync_core::cache::KeyValueStore;
use jamahsync_core::clock::Clock;
use jamahsync_core::notifications::{
    desired_alerts, plan_reconciliation, AlertFacility, NotificationPreferences, PermissionStatus,
    DEFAULT_HORIZON_DAYS,
};
use jamahsync_core::schedule::ScheduleRecord;

use crate::error::{Result, SyncError};
use crate::preferences::PreferenceStore;

/// Counts of what one reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub cancelled: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Drives the device alert facility from the schedule and preferences.
pub struct NotificationScheduler<F, S>
where
    F: AlertFacility,
    S: KeyValueStore,
{
    facility: Arc<F>,
    preferences: PreferenceStore<S>,
    clock: Arc<dyn Clock>,
    horizon_days: u32,
    /// Only one reconciliation talks to the facility at a time.
    reconcile_lock: Mutex<()>,
}

impl<F, S> NotificationScheduler<F, S>
where
    F: AlertFacility,
    S: KeyValueStore,
{
    pub fn new(facility: Arc<F>, preferences: PreferenceStore<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            facility,
            preferences,
            clock,
            horizon_days: DEFAULT_HORIZON_DAYS,
            reconcile_lock: Mutex::new(()),
        }
    }

    /// Overrides the number of days alerts are materialized for.
    pub fn with_horizon_days(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days;
        self
    }

    pub fn preferences(&self) -> &PreferenceStore<S> {
        &self.preferences
    }

    pub fn facility(&self) -> &F {
        &self.facility
    }

    /// Reconciles against the persisted preferences and the clock.
    pub async fn reconcile(&self, schedule: &[ScheduleRecord]) -> Result<ReconcileReport> {
        let preferences = self.preferences.load().await?;
        let now = self.clock.local_now();
        Ok(self.reconcile_with(schedule, &preferences, now).await)
    }

    /// Reconciles against explicit inputs.
    ///
    /// Running twice with the same inputs makes no facility calls the
    /// second time.
    pub async fn reconcile_with(
        &self,
        schedule: &[ScheduleRecord],
        preferences: &NotificationPreferences,
        now: NaiveDateTime,
    ) -> ReconcileReport {
        let _guard = self.reconcile_lock.lock().await;

        let desired = desired_alerts(schedule, preferences, now, self.horizon_days);
        let registered = match self.facility.registered_alerts().await {
            Ok(registered) => registered,
            Err(err) => {
                // Scheduling an existing identity replaces it, so an empty
                // view only costs redundant calls.
                tracing::warn!(error = %err, "Failed to list registered alerts");
                Vec::new()
            }
        };

        let plan = plan_reconciliation(&desired, &registered);
        let mut report = ReconcileReport {
            unchanged: plan.unchanged,
            ..ReconcileReport::default()
        };

        for id in &plan.to_cancel {
            match self.facility.cancel_alert(id).await {
                Ok(()) => report.cancelled += 1,
                Err(err) => {
                    tracing::warn!(%id, error = %err, "Failed to cancel alert");
                    report.failed += 1;
                }
            }
        }

        for alert in &plan.to_create {
            match self.facility.schedule_alert(alert).await {
                Ok(()) => report.created += 1,
                Err(err) => {
                    tracing::warn!(id = %alert.id, error = %err, "Failed to schedule alert");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            desired = desired.len(),
            created = report.created,
            cancelled = report.cancelled,
            unchanged = report.unchanged,
            failed = report.failed,
            "Alerts reconciled"
        );
        report
    }

    /// Asks the device for permission and turns notifications on.
    ///
    /// On denial every toggle is forced off and persisted before
    /// [`SyncError::PermissionDenied`] is returned. When both categories
    /// were off, enabling turns both back on.
    pub async fn enable_notifications(&self) -> Result<NotificationPreferences> {
        let permission = match self.facility.request_permission().await {
            Ok(permission) => permission,
            Err(err) => {
                tracing::warn!(error = %err, "Permission request failed");
                PermissionStatus::Denied
            }
        };

        if !permission.is_granted() {
            self.preferences
                .update(|prev| NotificationPreferences {
                    has_asked_permission: true,
                    ..prev.forced_off()
                })
                .await?;
            tracing::warn!("Notification permission denied, notifications turned off");
            return Err(SyncError::PermissionDenied);
        }

        self.preferences
            .update(|prev| {
                let revive = !prev.begin_times_enabled && !prev.congregation_times_enabled;
                NotificationPreferences {
                    is_enabled: true,
                    begin_times_enabled: prev.begin_times_enabled || revive,
                    congregation_times_enabled: prev.congregation_times_enabled || revive,
                    has_asked_permission: true,
                    ..prev
                }
            })
            .await
    }

    /// Turns the master switch off, keeping the category choices.
    pub async fn disable_notifications(&self) -> Result<NotificationPreferences> {
        self.preferences
            .update(|prev| NotificationPreferences {
                is_enabled: false,
                ..prev
            })
            .await
    }

    /// Saves the record `f` builds from the persisted one.
    pub async fn update_preferences<G>(&self, f: G) -> Result<NotificationPreferences>
    where
        G: FnOnce(NotificationPreferences) -> NotificationPreferences,
    {
        self.preferences.update(f).await
    }
}
