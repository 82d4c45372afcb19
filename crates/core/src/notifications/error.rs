use thiserror::Error;

/// Errors reported by the device alert facility.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("Alert {id} rejected: {reason}")]
    Rejected { id: String, reason: String },
    #[error("Notification permission denied")]
    PermissionDenied,
    #[error("Alert facility unavailable: {0}")]
    Unavailable(String),
}

/// Result type for alert facility operations.
pub type Result<T> = std::result::Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display() {
        let error = AlertError::Rejected {
            id: "2024-06-01:zuhr:begin".to_string(),
            reason: "fire time in the past".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Alert 2024-06-01:zuhr:begin rejected: fire time in the past"
        );
    }

    #[test]
    fn test_permission_denied_display() {
        assert_eq!(
            AlertError::PermissionDenied.to_string(),
            "Notification permission denied"
        );
    }
}
