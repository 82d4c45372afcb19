//! Alert facility that keeps registrations in memory and logs every call.
//!
//! Used by the binary where no device notification API exists, and by
//! tests to observe exactly which calls reconciliation made.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use jamahsync_core::notifications::{
    AlertError, AlertFacility, AlertId, PermissionStatus, PlannedAlert, RegisteredAlert, Result,
};

/// In-memory alert facility.
#[derive(Debug, Clone)]
pub struct LogAlertFacility {
    alerts: Arc<RwLock<BTreeMap<AlertId, PlannedAlert>>>,
    permission: Arc<RwLock<PermissionStatus>>,
    rejected: Arc<RwLock<BTreeSet<AlertId>>>,
    schedule_calls: Arc<AtomicUsize>,
    cancel_calls: Arc<AtomicUsize>,
    permission_requests: Arc<AtomicUsize>,
}

impl Default for LogAlertFacility {
    fn default() -> Self {
        Self::new(PermissionStatus::Granted)
    }
}

impl LogAlertFacility {
    /// Creates a facility that answers permission requests with `permission`.
    pub fn new(permission: PermissionStatus) -> Self {
        Self {
            alerts: Arc::new(RwLock::new(BTreeMap::new())),
            permission: Arc::new(RwLock::new(permission)),
            rejected: Arc::new(RwLock::new(BTreeSet::new())),
            schedule_calls: Arc::new(AtomicUsize::new(0)),
            cancel_calls: Arc::new(AtomicUsize::new(0)),
            permission_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn set_permission(&self, permission: PermissionStatus) {
        *self.permission.write().await = permission;
    }

    /// Makes scheduling `id` fail until cleared.
    pub async fn reject(&self, id: AlertId) {
        self.rejected.write().await.insert(id);
    }

    pub async fn clear_rejections(&self) {
        self.rejected.write().await.clear();
    }

    /// Registered alerts ordered by fire time.
    pub async fn alerts(&self) -> Vec<PlannedAlert> {
        let mut alerts: Vec<PlannedAlert> = self.alerts.read().await.values().cloned().collect();
        alerts.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.id.cmp(&b.id)));
        alerts
    }

    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertFacility for LogAlertFacility {
    async fn schedule_alert(&self, alert: &PlannedAlert) -> Result<()> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);

        if !self.permission.read().await.is_granted() {
            return Err(AlertError::PermissionDenied);
        }
        if self.rejected.read().await.contains(&alert.id) {
            return Err(AlertError::Rejected {
                id: alert.id.to_string(),
                reason: "rejected by device".to_string(),
            });
        }

        self.alerts.write().await.insert(alert.id, alert.clone());
        tracing::info!(
            id = %alert.id,
            fire_at = %alert.fire_at,
            title = %alert.payload.title,
            "Alert scheduled"
        );
        Ok(())
    }

    async fn cancel_alert(&self, id: &AlertId) -> Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if self.alerts.write().await.remove(id).is_some() {
            tracing::info!(%id, "Alert cancelled");
        }
        Ok(())
    }

    async fn registered_alerts(&self) -> Result<Vec<RegisteredAlert>> {
        Ok(self
            .alerts
            .read()
            .await
            .values()
            .map(|a| RegisteredAlert {
                id: a.id,
                fire_at: a.fire_at,
            })
            .collect())
    }

    async fn query_permission(&self) -> Result<PermissionStatus> {
        Ok(*self.permission.read().await)
    }

    async fn request_permission(&self) -> Result<PermissionStatus> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        let permission = *self.permission.read().await;
        tracing::info!(?permission, "Notification permission requested");
        Ok(permission)
    }
}
