//! Lifecycle coordination.
//!
//! A single task owns the reschedule triggers and the first-run setup flow.
//! Alerts are reconciled when the resolved schedule changes, when
//! preferences are saved, and (debounced) when the app returns to the
//! foreground with notifications enabled. Setup events move the pure
//! state machine in `jamahsync_core::setup` and this task performs the
//! side effects it asks for.

mod debounce;

pub use debounce::Debouncer;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use jamahsync_core::cache::KeyValueStore;
use jamahsync_core::notifications::{AlertFacility, NotificationPreferences};
use jamahsync_core::setup::{transition, SetupAction, SetupEvent, SetupState};
use jamahsync_core::storage::RemoteScheduleStore;

use crate::scheduler::{NotificationScheduler, ReconcileReport};
use crate::sync::{Snapshot, SyncCoordinator};

const EVENT_CAPACITY: usize = 32;

/// Foreground/background state reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Foreground,
    Background,
}

/// Timing of the debounced transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub foreground_debounce: Duration,
    pub setup_transition_delay: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            foreground_debounce: Duration::from_millis(1000),
            setup_transition_delay: Duration::from_millis(300),
        }
    }
}

/// Running total of reconciliations performed by the lifecycle task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub runs: u64,
    pub last: ReconcileReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    AppState(AppState),
    BeginSetup,
    LanguageChosen,
    NotificationSkipped,
    NotificationCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    ForegroundElapsed(u64),
    TransitionElapsed(u64),
}

/// Wires the sync coordinator to the notification scheduler.
pub struct LifecycleCoordinator<R, S, F>
where
    R: RemoteScheduleStore,
    S: KeyValueStore,
    F: AlertFacility,
{
    sync: Arc<SyncCoordinator<R, S>>,
    scheduler: Arc<NotificationScheduler<F, S>>,
    config: LifecycleConfig,
}

impl<R, S, F> LifecycleCoordinator<R, S, F>
where
    R: RemoteScheduleStore + 'static,
    S: KeyValueStore + 'static,
    F: AlertFacility + 'static,
{
    pub fn new(
        sync: Arc<SyncCoordinator<R, S>>,
        scheduler: Arc<NotificationScheduler<F, S>>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            sync,
            scheduler,
            config,
        }
    }

    /// Starts the lifecycle task.
    ///
    /// The task stops once the returned handle is dropped or shut down.
    pub fn spawn(self) -> LifecycleHandle {
        let (commands_tx, commands) = mpsc::channel(EVENT_CAPACITY);
        let (timers_tx, timers) = mpsc::channel(EVENT_CAPACITY);
        let (setup_tx, setup) = watch::channel(SetupState::Idle);
        let (reconciled_tx, reconciled) = watch::channel(Reconciled::default());

        let worker = Worker {
            schedule: self.sync.current(),
            preferences: self.scheduler.preferences().subscribe(),
            sync: self.sync,
            scheduler: self.scheduler,
            foreground: Debouncer::new(self.config.foreground_debounce),
            dismiss: Debouncer::new(self.config.setup_transition_delay),
            timers_tx,
            setup: setup_tx,
            setup_requested: false,
            reconciled: reconciled_tx,
        };
        let task = tokio::spawn(worker.run(commands, timers));

        LifecycleHandle {
            commands: commands_tx,
            setup,
            reconciled,
            task,
        }
    }
}

struct Worker<R, S, F>
where
    R: RemoteScheduleStore,
    S: KeyValueStore,
    F: AlertFacility,
{
    sync: Arc<SyncCoordinator<R, S>>,
    scheduler: Arc<NotificationScheduler<F, S>>,
    schedule: watch::Receiver<Option<Snapshot>>,
    preferences: watch::Receiver<NotificationPreferences>,
    foreground: Debouncer,
    dismiss: Debouncer,
    timers_tx: mpsc::Sender<Timer>,
    setup: watch::Sender<SetupState>,
    /// Setup was asked for before the schedule had loaded.
    setup_requested: bool,
    reconciled: watch::Sender<Reconciled>,
}

impl<R, S, F> Worker<R, S, F>
where
    R: RemoteScheduleStore + 'static,
    S: KeyValueStore + 'static,
    F: AlertFacility + 'static,
{
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut timers: mpsc::Receiver<Timer>) {
        tracing::debug!("Lifecycle task started");

        loop {
            // Commands first, so a cancel sent before a timer message was
            // queued is applied before that message is looked at.
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                Some(timer) = timers.recv() => self.on_timer(timer).await,
                Ok(()) = self.schedule.changed() => {
                    self.reschedule("schedule changed").await;
                    if self.setup_requested {
                        self.begin_setup().await;
                    }
                }
                Ok(()) = self.preferences.changed() => {
                    self.reschedule("preferences saved").await;
                }
            }
        }

        self.foreground.cancel();
        self.dismiss.cancel();
        tracing::debug!("Lifecycle task stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::AppState(AppState::Foreground) => self.on_foreground().await,
            Command::AppState(AppState::Background) => {
                if self.foreground.cancel() {
                    tracing::trace!("Pending foreground reschedule dropped");
                }
            }
            Command::BeginSetup => {
                self.setup_requested = true;
                self.begin_setup().await;
            }
            Command::LanguageChosen => self.apply(SetupEvent::LanguageChosen).await,
            Command::NotificationSkipped => self.apply(SetupEvent::NotificationSkipped).await,
            Command::NotificationCompleted => self.apply(SetupEvent::NotificationCompleted).await,
        }
    }

    async fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::ForegroundElapsed(generation) if self.foreground.is_current(generation) => {
                self.refresh().await;
                self.reschedule("app foregrounded").await;
            }
            Timer::TransitionElapsed(generation) if self.dismiss.is_current(generation) => {
                self.apply(SetupEvent::TransitionElapsed).await;
            }
            timer => tracing::trace!(?timer, "Dropping cancelled timer"),
        }
    }

    async fn on_foreground(&mut self) {
        let enabled = match self.scheduler.preferences().load().await {
            Ok(preferences) => preferences.is_enabled,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load preferences");
                false
            }
        };
        if !enabled {
            return;
        }

        // Permission can be revoked from the device settings while away.
        match self.scheduler.facility().query_permission().await {
            Ok(permission) if !permission.is_granted() => {
                tracing::warn!("Notification permission revoked, turning notifications off");
                let saved = self
                    .scheduler
                    .update_preferences(NotificationPreferences::forced_off)
                    .await;
                if let Err(err) = saved {
                    tracing::warn!(error = %err, "Failed to persist revoked permission");
                }
                return;
            }
            Ok(_) => {}
            Err(err) => tracing::debug!(error = %err, "Permission query failed"),
        }

        let timers = self.timers_tx.clone();
        self.foreground.arm(|generation| async move {
            let _ = timers.send(Timer::ForegroundElapsed(generation)).await;
        });
    }

    /// Re-resolves the schedule. A changed snapshot is picked up by the
    /// reschedule that follows.
    async fn refresh(&self) {
        if let Err(err) = self.sync.get_all().await {
            tracing::warn!(error = %err, "Schedule refresh failed");
        }
    }

    async fn reschedule(&mut self, reason: &'static str) {
        let snapshot = self.schedule.borrow_and_update().clone();
        let Some(snapshot) = snapshot else {
            tracing::debug!(reason, "No schedule resolved yet, skipping reschedule");
            return;
        };

        tracing::debug!(reason, records = snapshot.len(), "Rescheduling alerts");
        match self.scheduler.reconcile(&snapshot).await {
            Ok(report) => {
                self.reconciled.send_modify(|reconciled| {
                    reconciled.runs += 1;
                    reconciled.last = report;
                });
            }
            Err(err) => tracing::warn!(error = %err, reason, "Reschedule failed"),
        }
    }

    async fn begin_setup(&mut self) {
        let has_asked_permission = match self.scheduler.preferences().load().await {
            Ok(preferences) => preferences.has_asked_permission,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load preferences");
                return;
            }
        };
        let schedule_loaded = self.schedule.borrow().is_some();

        self.apply(SetupEvent::Begin {
            has_asked_permission,
            schedule_loaded,
        })
        .await;
    }

    async fn apply(&mut self, event: SetupEvent) {
        let current = *self.setup.borrow();
        let next = transition(current, event);

        if next.state != current {
            tracing::debug!(from = ?current, to = ?next.state, ?event, "Setup transition");
            self.setup.send_replace(next.state);
        }
        if next.state != SetupState::Idle {
            self.setup_requested = false;
        }

        let Some(action) = next.action else {
            return;
        };

        match action {
            SetupAction::ShowLanguageModal => tracing::info!("Showing language selection"),
            SetupAction::ArmTransition => {
                let timers = self.timers_tx.clone();
                self.dismiss.arm(|generation| async move {
                    let _ = timers.send(Timer::TransitionElapsed(generation)).await;
                });
            }
            SetupAction::ShowNotificationModal => tracing::info!("Showing notification opt-in"),
            SetupAction::PersistAsked => self.persist_asked(event).await,
        }
    }

    /// Records that the user was asked. Completing the step also requests
    /// permission, and that single save carries the flag.
    async fn persist_asked(&self, event: SetupEvent) {
        if event == SetupEvent::NotificationCompleted {
            match self.scheduler.enable_notifications().await {
                Ok(_) => tracing::info!("Notifications enabled during setup"),
                Err(err) => tracing::warn!(error = %err, "Notifications not enabled during setup"),
            }
            return;
        }

        let saved = self
            .scheduler
            .update_preferences(|prev| NotificationPreferences {
                has_asked_permission: true,
                ..prev
            })
            .await;
        if let Err(err) = saved {
            tracing::warn!(error = %err, "Failed to persist setup completion");
        }
    }
}

/// Handle to a running lifecycle task.
#[derive(Debug)]
pub struct LifecycleHandle {
    commands: mpsc::Sender<Command>,
    setup: watch::Receiver<SetupState>,
    reconciled: watch::Receiver<Reconciled>,
    task: JoinHandle<()>,
}

impl LifecycleHandle {
    async fn send(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            tracing::warn!(?command, "Lifecycle task is not running");
        }
    }

    /// Reports a foreground/background transition.
    pub async fn app_state(&self, state: AppState) {
        self.send(Command::AppState(state)).await;
    }

    /// Enters the first-run flow if the user was never asked and the
    /// schedule has loaded. A request made before the schedule loads is
    /// retried when it does.
    pub async fn begin_setup(&self) {
        self.send(Command::BeginSetup).await;
    }

    pub async fn language_chosen(&self) {
        self.send(Command::LanguageChosen).await;
    }

    pub async fn notification_skipped(&self) {
        self.send(Command::NotificationSkipped).await;
    }

    /// Completes the opt-in step, requesting notification permission.
    pub async fn notification_completed(&self) {
        self.send(Command::NotificationCompleted).await;
    }

    /// Watches the setup flow.
    pub fn setup_state(&self) -> watch::Receiver<SetupState> {
        self.setup.clone()
    }

    /// Watches reconciliations.
    pub fn reconciled(&self) -> watch::Receiver<Reconciled> {
        self.reconciled.clone()
    }

    /// Stops the task and waits for it to finish.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "Lifecycle task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::LogAlertFacility;
    use crate::local_cache::LocalCache;
    use crate::preferences::PreferenceStore;
    use crate::remote::InMemoryRemoteStore;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use jamahsync_core::cache::{StoreError, DEFAULT_TTL, PREFERENCES_KEY};
    use jamahsync_core::clock::ManualClock;
    use jamahsync_core::notifications::{
        AlertId, AlertKind, LeadMinutes, PermissionStatus, PlannedAlert, RegisteredAlert,
    };
    use jamahsync_core::schedule::{generate_schedule, sample_record, Prayer};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Memory store counting preference writes.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        preference_writes: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for CountingStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
            if key == PREFERENCES_KEY {
                self.preference_writes.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key).await
        }
    }

    struct Harness {
        sync: Arc<SyncCoordinator<InMemoryRemoteStore, CountingStore>>,
        scheduler: Arc<NotificationScheduler<LogAlertFacility, CountingStore>>,
        remote: Arc<InMemoryRemoteStore>,
        facility: Arc<LogAlertFacility>,
        store: Arc<CountingStore>,
        clock: Arc<ManualClock>,
    }

    /// Alert facility whose next listing blocks until released.
    #[derive(Default)]
    struct GatedFacility {
        inner: LogAlertFacility,
        block_next: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl AlertFacility for GatedFacility {
        async fn schedule_alert(
            &self,
            alert: &PlannedAlert,
        ) -> jamahsync_core::notifications::Result<()> {
            self.inner.schedule_alert(alert).await
        }

        async fn cancel_alert(&self, id: &AlertId) -> jamahsync_core::notifications::Result<()> {
            self.inner.cancel_alert(id).await
        }

        async fn registered_alerts(
            &self,
        ) -> jamahsync_core::notifications::Result<Vec<RegisteredAlert>> {
            if self.block_next.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.registered_alerts().await
        }

        async fn query_permission(
            &self,
        ) -> jamahsync_core::notifications::Result<PermissionStatus> {
            self.inner.query_permission().await
        }

        async fn request_permission(
            &self,
        ) -> jamahsync_core::notifications::Result<PermissionStatus> {
            self.inner.request_permission().await
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn harness(permission: PermissionStatus) -> Harness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let store = Arc::new(CountingStore::default());
        let remote = Arc::new(InMemoryRemoteStore::with_records(generate_schedule(d(1), 7)));
        let facility = Arc::new(LogAlertFacility::new(permission));

        let cache = LocalCache::new(store.clone(), clock.clone(), DEFAULT_TTL);
        let sync = Arc::new(SyncCoordinator::new(remote.clone(), cache, clock.clone()));
        let scheduler = Arc::new(NotificationScheduler::new(
            facility.clone(),
            PreferenceStore::new(store.clone()),
            clock.clone(),
        ));

        Harness {
            sync,
            scheduler,
            remote,
            facility,
            store,
            clock,
        }
    }

    impl Harness {
        fn spawn(&self) -> LifecycleHandle {
            LifecycleCoordinator::new(
                self.sync.clone(),
                self.scheduler.clone(),
                LifecycleConfig::default(),
            )
            .spawn()
        }

        async fn enable(&self) {
            self.scheduler
                .update_preferences(|prev| NotificationPreferences {
                    is_enabled: true,
                    has_asked_permission: true,
                    ..prev
                })
                .await
                .unwrap();
        }
    }

    async fn wait_runs(handle: &LifecycleHandle, runs: u64) {
        let mut reconciled = handle.reconciled();
        reconciled.wait_for(|r| r.runs >= runs).await.unwrap();
    }

    async fn wait_state(handle: &LifecycleHandle, state: SetupState) {
        let mut setup = handle.setup_state();
        setup.wait_for(|s| *s == state).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_change_reschedules() {
        let h = harness(PermissionStatus::Granted);
        h.enable().await;
        let handle = h.spawn();

        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;

        let registered = h.facility.alerts().await.len();
        let last = handle.reconciled().borrow().last;
        assert!(registered > 0);
        assert_eq!(last.created, registered);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_reschedules() {
        let h = harness(PermissionStatus::Granted);
        h.enable().await;
        let handle = h.spawn();
        let mut subscription = h.sync.subscribe().await.unwrap();
        subscription.recv().await.unwrap();
        wait_runs(&handle, 1).await;

        let mut moved = sample_record(d(2));
        moved.isha.jamah = moved.isha.jamah + chrono::Duration::minutes(10);
        h.remote.write(&moved).await.unwrap();
        subscription.recv().await.unwrap();
        wait_runs(&handle, 2).await;

        let last = handle.reconciled().borrow().last;
        assert_eq!(last.cancelled, 1);
        assert_eq!(last.created, 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_preference_save_reschedules() {
        let h = harness(PermissionStatus::Granted);
        let handle = h.spawn();
        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;
        assert!(h.facility.alerts().await.is_empty());

        h.enable().await;
        wait_runs(&handle, 2).await;

        assert!(!h.facility.alerts().await.is_empty());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_is_debounced() {
        let h = harness(PermissionStatus::Granted);
        h.enable().await;
        let handle = h.spawn();
        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;

        for _ in 0..3 {
            handle.app_state(AppState::Background).await;
            handle.app_state(AppState::Foreground).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(handle.reconciled().borrow().runs, 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(handle.reconciled().borrow().runs, 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_ignored_while_disabled() {
        let h = harness(PermissionStatus::Granted);
        let handle = h.spawn();
        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;

        handle.app_state(AppState::Foreground).await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(handle.reconciled().borrow().runs, 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_drops_pending_foreground() {
        let h = harness(PermissionStatus::Granted);
        h.enable().await;
        let handle = h.spawn();
        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;

        handle.app_state(AppState::Foreground).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.app_state(AppState::Background).await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(handle.reconciled().borrow().runs, 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_drops_foreground_timer_queued_while_busy() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let store = Arc::new(CountingStore::default());
        let remote = Arc::new(InMemoryRemoteStore::with_records(generate_schedule(d(1), 7)));
        let facility = Arc::new(GatedFacility::default());
        let cache = LocalCache::new(store.clone(), clock.clone(), DEFAULT_TTL);
        let sync = Arc::new(SyncCoordinator::new(remote, cache, clock.clone()));
        let scheduler = Arc::new(NotificationScheduler::new(
            facility.clone(),
            PreferenceStore::new(store),
            clock,
        ));
        scheduler
            .update_preferences(|prev| NotificationPreferences {
                is_enabled: true,
                has_asked_permission: true,
                ..prev
            })
            .await
            .unwrap();
        let handle =
            LifecycleCoordinator::new(sync.clone(), scheduler.clone(), LifecycleConfig::default())
                .spawn();
        sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;

        handle.app_state(AppState::Foreground).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Hold the worker inside a reconcile past the foreground deadline.
        facility.block_next.store(true, Ordering::SeqCst);
        scheduler.update_preferences(|prev| prev).await.unwrap();
        facility.entered.notified().await;

        tokio::time::sleep(Duration::from_millis(490)).await;
        handle.app_state(AppState::Background).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        facility.release.notify_one();

        wait_runs(&handle, 2).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(handle.reconciled().borrow().runs, 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_refreshes_expired_schedule() {
        let h = harness(PermissionStatus::Granted);
        h.enable().await;
        let handle = h.spawn();
        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;

        let mut moved = sample_record(d(3));
        moved.isha.jamah = moved.isha.jamah + chrono::Duration::minutes(10);
        h.remote.write(&moved).await.unwrap();
        h.clock.advance(chrono::Duration::hours(25));

        handle.app_state(AppState::Foreground).await;
        wait_runs(&handle, 2).await;

        let id = AlertId::new(d(3), Prayer::Isha, AlertKind::Congregation);
        let alert = h
            .facility
            .alerts()
            .await
            .into_iter()
            .find(|a| a.id == id)
            .unwrap();
        assert_eq!(
            alert.fire_at,
            moved.jamah_at(Prayer::Isha) - LeadMinutes::Ten.duration()
        );
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_turns_off_after_revoked_permission() {
        let h = harness(PermissionStatus::Granted);
        h.enable().await;
        let handle = h.spawn();
        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;
        assert!(!h.facility.alerts().await.is_empty());

        h.facility.set_permission(PermissionStatus::Denied).await;
        handle.app_state(AppState::Foreground).await;
        wait_runs(&handle, 2).await;

        let preferences = h.scheduler.preferences().load().await.unwrap();
        assert!(!preferences.is_enabled);
        assert!(!preferences.begin_times_enabled);
        assert!(!preferences.congregation_times_enabled);
        assert!(preferences.has_asked_permission);
        assert!(h.facility.alerts().await.is_empty());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(handle.reconciled().borrow().runs, 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_flow_skip() {
        let h = harness(PermissionStatus::Granted);
        let handle = h.spawn();
        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;

        handle.begin_setup().await;
        wait_state(&handle, SetupState::LanguageModalShown).await;

        handle.language_chosen().await;
        wait_state(&handle, SetupState::LanguageDismissing).await;

        // Re-arming restarts the dismiss delay.
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.language_chosen().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*handle.setup_state().borrow(), SetupState::LanguageDismissing);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            *handle.setup_state().borrow(),
            SetupState::NotificationModalShown
        );

        let writes_before = h.store.preference_writes.load(Ordering::SeqCst);
        handle.notification_skipped().await;
        wait_state(&handle, SetupState::Done).await;
        wait_runs(&handle, 2).await;

        let preferences = h.scheduler.preferences().load().await.unwrap();
        assert!(preferences.has_asked_permission);
        assert!(!preferences.is_enabled);
        assert_eq!(
            h.store.preference_writes.load(Ordering::SeqCst),
            writes_before + 1
        );

        // The flow is entered only once.
        handle.begin_setup().await;
        handle.notification_skipped().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*handle.setup_state().borrow(), SetupState::Done);
        assert_eq!(
            h.store.preference_writes.load(Ordering::SeqCst),
            writes_before + 1
        );
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_flow_complete_enables() {
        let h = harness(PermissionStatus::Granted);
        let handle = h.spawn();
        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;

        handle.begin_setup().await;
        handle.language_chosen().await;
        wait_state(&handle, SetupState::NotificationModalShown).await;

        handle.notification_completed().await;
        wait_state(&handle, SetupState::Done).await;
        wait_runs(&handle, 2).await;

        let preferences = h.scheduler.preferences().load().await.unwrap();
        assert!(preferences.is_enabled);
        assert!(preferences.has_asked_permission);
        assert_eq!(h.facility.permission_requests(), 1);
        assert_eq!(h.store.preference_writes.load(Ordering::SeqCst), 1);
        assert!(!h.facility.alerts().await.is_empty());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_complete_denied_forces_off() {
        let h = harness(PermissionStatus::Denied);
        let handle = h.spawn();
        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;

        handle.begin_setup().await;
        handle.language_chosen().await;
        wait_state(&handle, SetupState::NotificationModalShown).await;
        handle.notification_completed().await;
        wait_state(&handle, SetupState::Done).await;
        wait_runs(&handle, 2).await;

        let preferences = h.scheduler.preferences().load().await.unwrap();
        assert!(preferences.has_asked_permission);
        assert!(!preferences.is_enabled);
        assert!(!preferences.begin_times_enabled);
        assert!(!preferences.congregation_times_enabled);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_waits_for_schedule() {
        let h = harness(PermissionStatus::Granted);
        let handle = h.spawn();

        handle.begin_setup().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*handle.setup_state().borrow(), SetupState::Idle);

        h.sync.get_all().await.unwrap();
        wait_state(&handle, SetupState::LanguageModalShown).await;
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_skipped_when_already_asked() {
        let h = harness(PermissionStatus::Granted);
        h.enable().await;
        let handle = h.spawn();
        h.sync.get_all().await.unwrap();
        wait_runs(&handle, 1).await;

        handle.begin_setup().await;
        wait_state(&handle, SetupState::Done).await;
        handle.shutdown().await;
    }
}
