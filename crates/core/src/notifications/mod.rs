mod error;
mod planning;
mod traits;
mod types;

pub use error::{AlertError, Result};
pub use planning::{desired_alerts, plan_reconciliation, DEFAULT_HORIZON_DAYS};
pub use traits::AlertFacility;
pub use types::{
    AlertId, AlertKind, AlertPayload, AlertPlan, LeadMinutes, NotificationPreferences,
    PermissionStatus, PlannedAlert, RegisteredAlert,
};
