use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jamahsync::alerts::LogAlertFacility;
use jamahsync::cli::{Cli, Commands, OutputFormat};
use jamahsync::output::{format_plan, format_schedule, format_today};
use jamahsync::remote::{HttpRemoteStore, InMemoryRemoteStore};
use jamahsync::store::{open_device_store, DeviceStore};
use jamahsync::{
    AppState, Config, LifecycleCoordinator, LocalCache, NotificationScheduler, PreferenceStore,
    SyncCoordinator, SyncError,
};
use jamahsync_core::clock::{Clock, SystemClock};
use jamahsync_core::notifications::{LeadMinutes, NotificationPreferences};
use jamahsync_core::schedule::generate_schedule;
use jamahsync_core::storage::{DateRange, RemoteScheduleStore};

/// Days of schedule served by the demo backend.
const DEMO_DAYS: u32 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays pipeable.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jamahsync=info".into());
    if cli.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut config = Config::from_env();
    if let Some(url) = cli.remote_url.clone() {
        config.remote_url = url;
    }
    if let Some(path) = cli.sqlite_path.clone() {
        config.sqlite_path = path;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if cli.demo {
        let today = clock.local_now().date();
        let start = today - Duration::days(1);
        let remote = InMemoryRemoteStore::with_records(generate_schedule(start, DEMO_DAYS));
        tracing::info!(days = DEMO_DAYS, %start, "Serving demo schedule");
        run(cli, config, clock, remote).await
    } else {
        tracing::info!(url = %config.remote_url, "Using schedule API");
        let remote = HttpRemoteStore::new(config.remote_url.clone());
        run(cli, config, clock, remote).await
    }
}

async fn run<R>(cli: Cli, config: Config, clock: Arc<dyn Clock>, remote: R) -> Result<()>
where
    R: RemoteScheduleStore + 'static,
{
    let store: Arc<DeviceStore> = Arc::new(open_device_store(&config).await?);
    let cache = LocalCache::new(store.clone(), clock.clone(), config.cache_ttl());
    let sync = Arc::new(SyncCoordinator::new(Arc::new(remote), cache, clock.clone()));

    let preferences = PreferenceStore::new(store);
    preferences.load().await?;
    let scheduler = Arc::new(
        NotificationScheduler::new(
            Arc::new(LogAlertFacility::default()),
            preferences,
            clock.clone(),
        )
        .with_horizon_days(config.alert_horizon_days),
    );

    match cli.command {
        Commands::Schedule => {
            let records = sync.get_all().await?;
            println!("{}", format_schedule(&records, cli.format));
        }
        Commands::Today => {
            let now = clock.local_now();
            let today = sync.today(now).await?;
            let next = sync.next_prayer(now).await?;
            println!("{}", format_today(today.as_ref(), next.as_ref(), cli.format));
        }
        Commands::Range { start, end } => {
            let range = DateRange::new(start, end)?;
            let records = sync.get_by_range(range).await?;
            println!("{}", format_schedule(&records, cli.format));
        }
        Commands::Plan {
            enable,
            disable,
            lead,
        } => {
            if let Some(lead) = lead {
                let lead = LeadMinutes::try_from(lead.parse::<u32>()?).map_err(anyhow::Error::msg)?;
                scheduler
                    .update_preferences(|prev| NotificationPreferences {
                        reminder_lead_minutes: lead,
                        ..prev
                    })
                    .await?;
            }
            if enable {
                match scheduler.enable_notifications().await {
                    Ok(_) => {}
                    Err(SyncError::PermissionDenied) => {
                        eprintln!("Notification permission denied");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            if disable {
                scheduler.disable_notifications().await?;
            }

            let records = sync.get_all().await?;
            let report = scheduler.reconcile(&records).await?;
            let alerts = scheduler.facility().alerts().await;
            println!("{}", format_plan(&alerts, &report, cli.format));
        }
        Commands::Watch => watch(cli.format, config, sync, scheduler).await?,
    }

    Ok(())
}

async fn watch<R>(
    format: OutputFormat,
    config: Config,
    sync: Arc<SyncCoordinator<R, DeviceStore>>,
    scheduler: Arc<NotificationScheduler<LogAlertFacility, DeviceStore>>,
) -> Result<()>
where
    R: RemoteScheduleStore + 'static,
{
    if let Err(err) = sync.get_all().await {
        tracing::warn!(error = %err, "Initial schedule load failed");
    }

    let mut subscription = sync.subscribe().await?;
    let handle = LifecycleCoordinator::new(sync.clone(), scheduler, config.lifecycle()).spawn();
    handle.app_state(AppState::Foreground).await;

    let mut reconciled = handle.reconciled();
    tracing::info!("Watching schedule, press Ctrl-C to stop");

    loop {
        tokio::select! {
            snapshot = subscription.recv() => {
                let Some(snapshot) = snapshot else {
                    tracing::warn!("Schedule subscription closed");
                    break;
                };
                println!("{}", format_schedule(&snapshot, format));
            }
            changed = reconciled.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = *reconciled.borrow_and_update();
                tracing::info!(
                    runs = latest.runs,
                    created = latest.last.created,
                    cancelled = latest.last.cancelled,
                    unchanged = latest.last.unchanged,
                    failed = latest.last.failed,
                    "Alerts reconciled"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    subscription.unsubscribe();
    handle.shutdown().await;
    Ok(())
}
