//! Pure alert planning.
//!
//! `desired_alerts` maps (schedule, preferences, now) to the alerts that
//! should exist; `plan_reconciliation` diffs them against what the device
//! has registered.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::types::{
    AlertId, AlertKind, AlertPayload, AlertPlan, NotificationPreferences, PlannedAlert,
    RegisteredAlert,
};
use crate::schedule::{forward_window, Prayer, ScheduleRecord};

/// Number of days, starting today, for which alerts are materialized.
pub const DEFAULT_HORIZON_DAYS: u32 = 7;

/// Computes the alerts that should be registered.
///
/// Begin alerts fire exactly at the begin time; congregation alerts fire
/// `reminder_lead_minutes` before the congregation time. Only alerts
/// firing strictly after `now` and within `horizon_days` of today are
/// produced. The result is ordered by fire time, then identity.
pub fn desired_alerts(
    schedule: &[ScheduleRecord],
    preferences: &NotificationPreferences,
    now: NaiveDateTime,
    horizon_days: u32,
) -> Vec<PlannedAlert> {
    if !preferences.is_enabled {
        return Vec::new();
    }

    let lead = preferences.reminder_lead_minutes;
    let mut alerts = Vec::new();

    for record in forward_window(schedule, now.date(), horizon_days) {
        for prayer in Prayer::ALL {
            if preferences.schedules_begin_times() {
                let fire_at = record.begins_at(prayer);
                if fire_at > now {
                    alerts.push(PlannedAlert {
                        id: AlertId::new(record.date, prayer, AlertKind::Begin),
                        fire_at,
                        payload: begin_payload(record, prayer),
                    });
                }
            }

            if preferences.schedules_congregation_times() {
                let fire_at = record.jamah_at(prayer) - lead.duration();
                if fire_at > now {
                    alerts.push(PlannedAlert {
                        id: AlertId::new(record.date, prayer, AlertKind::Congregation),
                        fire_at,
                        payload: congregation_payload(record, prayer, lead.minutes()),
                    });
                }
            }
        }
    }

    alerts.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.id.cmp(&b.id)));
    alerts
}

/// Diffs the desired alerts against the registered ones.
///
/// Identities present on both sides with the same fire time are left alone.
/// An identity whose fire time moved is cancelled and created again.
pub fn plan_reconciliation(desired: &[PlannedAlert], registered: &[RegisteredAlert]) -> AlertPlan {
    let registered: BTreeMap<AlertId, NaiveDateTime> =
        registered.iter().map(|a| (a.id, a.fire_at)).collect();
    let wanted: BTreeMap<AlertId, &PlannedAlert> = desired.iter().map(|a| (a.id, a)).collect();

    let mut plan = AlertPlan::default();

    for (id, fire_at) in &registered {
        match wanted.get(id) {
            Some(alert) if alert.fire_at == *fire_at => plan.unchanged += 1,
            _ => plan.to_cancel.push(*id),
        }
    }

    for alert in desired {
        match registered.get(&alert.id) {
            Some(fire_at) if *fire_at == alert.fire_at => {}
            _ => plan.to_create.push(alert.clone()),
        }
    }

    plan
}

fn begin_payload(record: &ScheduleRecord, prayer: Prayer) -> AlertPayload {
    AlertPayload {
        title: prayer.display_name().to_string(),
        body: format!(
            "{} begins at {}",
            prayer,
            record.prayer(prayer).begins.format("%H:%M")
        ),
    }
}

fn congregation_payload(record: &ScheduleRecord, prayer: Prayer, lead: u32) -> AlertPayload {
    AlertPayload {
        title: format!("{prayer} jamah"),
        body: format!(
            "Jamah at {}, in {} minutes",
            record.prayer(prayer).jamah.format("%H:%M"),
            lead
        ),
    }
}
