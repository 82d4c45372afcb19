//! CLI command definitions.

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

/// Keep a device's prayer-time schedule and reminders in sync.
#[derive(Debug, Parser)]
#[command(name = "jamahsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Schedule API base URL (overrides REMOTE_URL).
    #[arg(long)]
    pub remote_url: Option<String>,

    /// SQLite database path (overrides SQLITE_PATH).
    #[arg(long)]
    pub sqlite_path: Option<String>,

    /// Serve a generated schedule from memory instead of the API.
    #[arg(long)]
    pub demo: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    pub json: bool,

    /// Output format.
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Raw JSON output.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the whole schedule, from cache when fresh.
    Schedule,
    /// Print today's times and the next prayer.
    Today,
    /// Print an inclusive date range straight from the remote store.
    Range {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Reconcile alerts against the schedule and print them.
    Plan {
        /// Request permission and turn notifications on first.
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        /// Turn notifications off first.
        #[arg(long)]
        disable: bool,
        /// Reminder lead time before congregation, in minutes.
        #[arg(long, value_parser = [ "5", "10", "15", "20", "30", "45", "60" ])]
        lead: Option<String>,
    },
    /// Follow schedule pushes and keep alerts reconciled until interrupted.
    Watch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        let cli = Cli::parse_from([
            "jamahsync",
            "--demo",
            "range",
            "--start",
            "2024-06-01",
            "--end",
            "2024-06-07",
        ]);

        assert!(cli.demo);
        match cli.command {
            Commands::Range { start, end } => {
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
                assert_eq!(end, NaiveDate::from_ymd_opt(2024, 6, 7).unwrap());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_plan_flags_conflict() {
        let result = Cli::try_parse_from(["jamahsync", "plan", "--enable", "--disable"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_rejects_unsupported_lead() {
        assert!(Cli::try_parse_from(["jamahsync", "plan", "--lead", "7"]).is_err());
        assert!(Cli::try_parse_from(["jamahsync", "plan", "--lead", "15"]).is_ok());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["jamahsync", "schedule"]);
        assert_eq!(cli.format, OutputFormat::Pretty);
        assert!(!cli.json);
        assert!(cli.remote_url.is_none());
    }
}
