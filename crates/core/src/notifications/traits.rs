use async_trait::async_trait;

use super::types::{AlertId, PermissionStatus, PlannedAlert, RegisteredAlert};
use super::Result;

/// The device's local alert facility.
///
/// The facility is trusted to fire each registered identity at most once.
#[async_trait]
pub trait AlertFacility: Send + Sync {
    /// Registers an alert. Registering an existing identity replaces it.
    async fn schedule_alert(&self, alert: &PlannedAlert) -> Result<()>;

    /// Cancels an alert. Cancelling an unknown identity succeeds.
    async fn cancel_alert(&self, id: &AlertId) -> Result<()>;

    /// Lists the alerts currently registered by this application.
    async fn registered_alerts(&self) -> Result<Vec<RegisteredAlert>>;

    /// Reads the current permission without prompting.
    async fn query_permission(&self) -> Result<PermissionStatus>;

    /// Prompts the user for permission when the platform allows it.
    async fn request_permission(&self) -> Result<PermissionStatus>;
}
