//! Output formatting functions.

use serde::Serialize;

use jamahsync_core::notifications::PlannedAlert;
use jamahsync_core::schedule::{Prayer, ScheduleRecord, UpcomingPrayer};

use crate::cli::OutputFormat;
use crate::scheduler::ReconcileReport;

/// Format a value as pretty JSON.
pub fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Format a schedule, one line per day.
pub fn format_schedule(records: &[ScheduleRecord], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&records),
        OutputFormat::Pretty if records.is_empty() => "No schedule records".to_string(),
        OutputFormat::Pretty => {
            let mut lines = vec![format!(
                "{:<10}  {:<5}  {}",
                "Date",
                "Rise",
                Prayer::ALL
                    .iter()
                    .map(|p| format!("{:<11}", p.display_name()))
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim_end()
            )];
            lines.extend(records.iter().map(format_record_line));
            lines.join("\n")
        }
    }
}

/// One day as `date  sunrise  begins/jamah ...`.
pub fn format_record_line(record: &ScheduleRecord) -> String {
    let times = record
        .prayers()
        .map(|(_, time)| {
            format!(
                "{}/{}",
                time.begins.format("%H:%M"),
                time.jamah.format("%H:%M")
            )
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{}  {}  {}",
        record.date.format("%Y-%m-%d"),
        record.sunrise.format("%H:%M"),
        times
    )
}

/// Today's record and the upcoming prayer.
pub fn format_today(
    record: Option<&ScheduleRecord>,
    upcoming: Option<&UpcomingPrayer>,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => format_json(&serde_json::json!({
            "today": record,
            "next": upcoming,
        })),
        OutputFormat::Pretty => {
            let today = record
                .map(format_record_line)
                .unwrap_or_else(|| "No record for today".to_string());
            let next = upcoming
                .map(|u| {
                    format!(
                        "Next: {} begins {} (jamah {})",
                        u.prayer,
                        u.begins.format("%Y-%m-%d %H:%M"),
                        u.jamah.format("%H:%M")
                    )
                })
                .unwrap_or_else(|| "Next: nothing scheduled".to_string());
            format!("{today}\n{next}")
        }
    }
}

/// Registered alerts followed by the reconcile summary.
pub fn format_plan(alerts: &[PlannedAlert], report: &ReconcileReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_json(&serde_json::json!({
            "alerts": alerts,
            "report": report,
        })),
        OutputFormat::Pretty => {
            let mut lines: Vec<String> = alerts
                .iter()
                .map(|a| {
                    format!(
                        "{}  {:<34}  {}",
                        a.fire_at.format("%Y-%m-%d %H:%M"),
                        a.id.to_string(),
                        a.payload.body
                    )
                })
                .collect();
            lines.push(format_report(report));
            lines.join("\n")
        }
    }
}

/// One-line reconcile summary.
pub fn format_report(report: &ReconcileReport) -> String {
    format!(
        "created {}, cancelled {}, unchanged {}, failed {}",
        report.created, report.cancelled, report.unchanged, report.failed
    )
}
