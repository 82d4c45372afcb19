use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};

use crate::schedule::Prayer;

/// Allowed reminder offsets before a congregation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum LeadMinutes {
    Five,
    Ten,
    Fifteen,
    Twenty,
    Thirty,
    FortyFive,
    Sixty,
}

impl LeadMinutes {
    /// All options in ascending order.
    pub const ALL: [LeadMinutes; 7] = [
        LeadMinutes::Five,
        LeadMinutes::Ten,
        LeadMinutes::Fifteen,
        LeadMinutes::Twenty,
        LeadMinutes::Thirty,
        LeadMinutes::FortyFive,
        LeadMinutes::Sixty,
    ];

    /// Returns the offset in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            LeadMinutes::Five => 5,
            LeadMinutes::Ten => 10,
            LeadMinutes::Fifteen => 15,
            LeadMinutes::Twenty => 20,
            LeadMinutes::Thirty => 30,
            LeadMinutes::FortyFive => 45,
            LeadMinutes::Sixty => 60,
        }
    }

    /// Returns the offset as a chrono duration.
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.minutes()))
    }
}

impl TryFrom<u32> for LeadMinutes {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        LeadMinutes::ALL
            .into_iter()
            .find(|lead| lead.minutes() == value)
            .ok_or_else(|| format!("unsupported reminder lead time: {value} minutes"))
    }
}

impl From<LeadMinutes> for u32 {
    fn from(lead: LeadMinutes) -> Self {
        lead.minutes()
    }
}

/// Persisted notification preferences.
///
/// Category flags are stored as the user left them, but read as disabled
/// while the master switch is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub is_enabled: bool,
    pub begin_times_enabled: bool,
    pub congregation_times_enabled: bool,
    pub reminder_lead_minutes: LeadMinutes,
    pub has_asked_permission: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            is_enabled: false,
            begin_times_enabled: true,
            congregation_times_enabled: true,
            reminder_lead_minutes: LeadMinutes::Ten,
            has_asked_permission: false,
        }
    }
}

impl NotificationPreferences {
    /// Begin-time alerts are wanted.
    pub fn schedules_begin_times(&self) -> bool {
        self.is_enabled && self.begin_times_enabled
    }

    /// Congregation reminders are wanted.
    pub fn schedules_congregation_times(&self) -> bool {
        self.is_enabled && self.congregation_times_enabled
    }

    /// The state persisted after the device refused permission.
    pub fn forced_off(self) -> Self {
        Self {
            is_enabled: false,
            begin_times_enabled: false,
            congregation_times_enabled: false,
            ..self
        }
    }
}

/// Which timestamp of a prayer an alert is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Begin,
    Congregation,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Begin => "begin",
            AlertKind::Congregation => "congregation",
        }
    }
}

/// Identity of a device alert: one per date, prayer, and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlertId {
    pub date: NaiveDate,
    pub prayer: Prayer,
    pub kind: AlertKind,
}

impl AlertId {
    pub fn new(date: NaiveDate, prayer: Prayer, kind: AlertKind) -> Self {
        Self { date, prayer, kind }
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.date.format("%Y-%m-%d"),
            self.prayer.as_str(),
            self.kind.as_str()
        )
    }
}

impl Serialize for AlertId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for AlertId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(date), Some(prayer), Some(kind), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("malformed alert id: {s}"));
        };

        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| format!("malformed alert date: {s}"))?;
        let prayer = Prayer::parse(prayer).ok_or_else(|| format!("unknown prayer: {s}"))?;
        let kind = match kind {
            "begin" => AlertKind::Begin,
            "congregation" => AlertKind::Congregation,
            _ => return Err(format!("unknown alert kind: {s}")),
        };

        Ok(Self { date, prayer, kind })
    }
}

/// Text shown by the device when an alert fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub title: String,
    pub body: String,
}

/// An alert the scheduler wants registered with the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAlert {
    pub id: AlertId,
    pub fire_at: NaiveDateTime,
    pub payload: AlertPayload,
}

/// An alert the device currently has registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredAlert {
    pub id: AlertId,
    pub fire_at: NaiveDateTime,
}

/// Minimal set of device calls that turns the registered set into the desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertPlan {
    pub to_cancel: Vec<AlertId>,
    pub to_create: Vec<PlannedAlert>,
    pub unchanged: usize,
}

impl AlertPlan {
    /// Returns true when no device call is needed.
    pub fn is_empty(&self) -> bool {
        self.to_cancel.is_empty() && self.to_create.is_empty()
    }
}

/// Device answer to a permission query or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_minutes_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&LeadMinutes::FortyFive).unwrap(), "45");
        let lead: LeadMinutes = serde_json::from_str("15").unwrap();
        assert_eq!(lead, LeadMinutes::Fifteen);
    }

    #[test]
    fn test_lead_minutes_rejects_unsupported_value() {
        let result: Result<LeadMinutes, _> = serde_json::from_str("7");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_preferences() {
        let preferences = NotificationPreferences::default();
        assert!(!preferences.is_enabled);
        assert!(!preferences.has_asked_permission);
        assert!(!preferences.schedules_begin_times());
        assert!(!preferences.schedules_congregation_times());
    }

    #[test]
    fn test_master_switch_masks_categories() {
        let preferences = NotificationPreferences {
            is_enabled: false,
            begin_times_enabled: true,
            congregation_times_enabled: true,
            ..NotificationPreferences::default()
        };
        assert!(!preferences.schedules_begin_times());
        assert!(!preferences.schedules_congregation_times());

        let enabled = NotificationPreferences {
            is_enabled: true,
            ..preferences
        };
        assert!(enabled.schedules_begin_times());
        assert!(enabled.schedules_congregation_times());
    }

    #[test]
    fn test_forced_off_keeps_other_fields() {
        let preferences = NotificationPreferences {
            is_enabled: true,
            reminder_lead_minutes: LeadMinutes::Thirty,
            has_asked_permission: true,
            ..NotificationPreferences::default()
        };

        let forced = preferences.forced_off();

        assert!(!forced.is_enabled);
        assert!(!forced.begin_times_enabled);
        assert!(!forced.congregation_times_enabled);
        assert_eq!(forced.reminder_lead_minutes, LeadMinutes::Thirty);
        assert!(forced.has_asked_permission);
    }

    #[test]
    fn test_preferences_json_uses_camel_case() {
        let json = serde_json::to_value(NotificationPreferences::default()).unwrap();
        assert_eq!(json["isEnabled"], false);
        assert_eq!(json["reminderLeadMinutes"], 10);
        assert_eq!(json["hasAskedPermission"], false);
    }

    #[test]
    fn test_preferences_missing_fields_use_defaults() {
        let preferences: NotificationPreferences =
            serde_json::from_str(r#"{"isEnabled": true}"#).unwrap();
        assert!(preferences.is_enabled);
        assert_eq!(preferences.reminder_lead_minutes, LeadMinutes::Ten);
    }

    #[test]
    fn test_alert_id_string_form() {
        let id = AlertId::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            Prayer::Zuhr,
            AlertKind::Congregation,
        );
        let text = id.to_string();
        assert_eq!(text, "2024-06-01:zuhr:congregation");
        assert_eq!(text.parse::<AlertId>().unwrap(), id);
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"2024-06-01:zuhr:congregation\""
        );
    }

    #[test]
    fn test_alert_id_parse_rejects_garbage() {
        assert!("2024-06-01:zuhr".parse::<AlertId>().is_err());
        assert!("2024-06-01:zuhr:begin:extra".parse::<AlertId>().is_err());
        assert!("2024-06-01:dhuha:begin".parse::<AlertId>().is_err());
        assert!("2024-06-01:zuhr:end".parse::<AlertId>().is_err());
    }
}
