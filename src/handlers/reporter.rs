use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::handlers::api::LocationSink;
use crate::handlers::device::{PermissionOutcome, PermissionProvider, PositionProvider};
use crate::handlers::storage::{KeyValueStore, EMAIL_KEY};
use crate::handlers::task::AutoCancelTask;
use crate::models::error::{CompanionError, Result};
use crate::models::location_log::LocationReport;
use crate::models::notification::{Notification, Notifier};
use crate::models::position::{Position, PositionOptions, TrackStatus};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Samples the device position on a fixed period and forwards every fix to the
/// ingestion endpoint, tagged with the account email.
///
/// At most one timer is ever installed. Restarting replaces it, and `stop` or
/// dropping the reporter cancels it. A sample already in flight is left to
/// finish.
pub struct LocationReporter {
    store: Arc<dyn KeyValueStore>,
    permissions: Arc<dyn PermissionProvider>,
    positions: Arc<dyn PositionProvider>,
    sink: Arc<dyn LocationSink>,
    notifier: Notifier,
    status: Arc<watch::Sender<TrackStatus>>,
    permission: Option<PermissionOutcome>,
    email: Option<String>,
    active: bool,
    timer: Option<AutoCancelTask<()>>,
    period: Duration,
    options: PositionOptions,
}

impl LocationReporter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        permissions: Arc<dyn PermissionProvider>,
        positions: Arc<dyn PositionProvider>,
        sink: Arc<dyn LocationSink>,
        notifier: Notifier,
    ) -> Self {
        let (status, _) = watch::channel(TrackStatus::default());
        Self {
            store,
            permissions,
            positions,
            sink,
            notifier,
            status: Arc::new(status),
            permission: None,
            email: None,
            active: false,
            timer: None,
            period: DEFAULT_PERIOD,
            options: PositionOptions::default(),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    /// Asks for location permission once and loads the account email.
    ///
    /// Neither step is fatal: a denial only makes later samples fail, and a
    /// missing email only makes `start` refuse.
    pub async fn initialize(&mut self) {
        if self.permission.is_none() {
            let outcome = self.permissions.request().await;
            match outcome {
                PermissionOutcome::Granted => info!("Location permission granted"),
                PermissionOutcome::Denied => warn!("Location permission denied"),
            }
            self.permission = Some(outcome);
        }

        match self.store.get(EMAIL_KEY).await {
            Ok(Some(email)) => self.email = Some(email),
            Ok(None) => info!("No email found in storage."),
            Err(e) => error!("Error retrieving email from storage: {}", e),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        let Some(email) = self.email.clone() else {
            let err = CompanionError::MissingAccount;
            warn!("Refusing to start tracking: {}", err);
            self.notifier.notify(Notification::error("Error", err.to_string()));
            return Err(err);
        };

        if self.timer.take().is_some() {
            debug!("Replacing running tracking timer");
        }

        let sampler = Sampler {
            positions: self.positions.clone(),
            sink: self.sink.clone(),
            notifier: self.notifier.clone(),
            status: self.status.clone(),
            email,
            permitted: self.permission != Some(PermissionOutcome::Denied),
            options: self.options,
        };
        let period = self.period;

        self.timer = Some(AutoCancelTask::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let sampler = sampler.clone();
                tokio::spawn(async move { sampler.sample().await });
            }
        }));
        self.active = true;
        info!("Started real-time tracking every {:?}", period);

        Ok(())
    }

    pub fn stop(&mut self) {
        if self.timer.take().is_some() {
            info!("Stopped real-time tracking");
        }
        self.active = false;
    }

    /// Stops when active, starts otherwise, then flips the active flag
    /// whatever the outcome of that call was.
    pub fn toggle(&mut self) -> bool {
        let was_active = self.active;
        if was_active {
            self.stop();
        } else if let Err(e) = self.start() {
            debug!("Toggle could not start tracking: {}", e);
        }
        self.active = !was_active;
        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn permission(&self) -> Option<PermissionOutcome> {
        self.permission
    }

    pub fn account_email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Takes effect on the next `start`.
    pub fn set_account_email(&mut self, email: impl Into<String>) {
        self.email = Some(email.into());
    }

    pub fn status(&self) -> TrackStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackStatus> {
        self.status.subscribe()
    }
}

impl Drop for LocationReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything one tick needs, detached from the reporter so a tick can outlive `stop`.
#[derive(Clone)]
struct Sampler {
    positions: Arc<dyn PositionProvider>,
    sink: Arc<dyn LocationSink>,
    notifier: Notifier,
    status: Arc<watch::Sender<TrackStatus>>,
    email: String,
    permitted: bool,
    options: PositionOptions,
}

impl Sampler {
    async fn sample(&self) {
        let position = match self.acquire().await {
            Ok(position) => position,
            Err(e) => {
                warn!("Position unavailable: {}", e);
                let message = e.to_string();
                self.status.send_modify(|s| s.last_error = Some(message.clone()));
                self.notifier.notify(Notification::error("Location Error", message));
                return;
            }
        };

        debug!("Position: {:?}", position);
        self.status.send_modify(|s| s.last_position = Some(position));

        let report = LocationReport::new(&position, self.email.as_str());
        if let Err(e) = self.sink.report_location(&report).await {
            error!("Error sending location: {}", e);
            self.notifier.notify(Notification::error("Tracking Error", e.to_string()));
        }
    }

    async fn acquire(&self) -> Result<Position> {
        if !self.permitted {
            return Err(CompanionError::PermissionDenied);
        }
        tokio::time::timeout(self.options.timeout, self.positions.current_position(&self.options))
            .await
            .map_err(|_| CompanionError::LocationTimeout(self.options.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::handlers::device::{FixedPosition, NoPermissionRequired};
    use crate::handlers::storage::MemoryStore;

    struct CountingPermission {
        outcome: PermissionOutcome,
        requests: AtomicUsize,
    }

    #[async_trait]
    impl PermissionProvider for CountingPermission {
        async fn request(&self) -> PermissionOutcome {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.outcome
        }
    }

    /// Fails every call whose index is listed, succeeds otherwise.
    struct FlakyPosition {
        calls: AtomicUsize,
        failing: Vec<usize>,
        stall_instead: bool,
    }

    #[async_trait]
    impl PositionProvider for FlakyPosition {
        async fn current_position(&self, _options: &PositionOptions) -> Result<Position> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&call) {
                if self.stall_instead {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                return Err(CompanionError::PositionUnavailable("no fix".to_string()));
            }
            Ok(Position::now(12.34, 56.78))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<LocationReport>>,
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.reports.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LocationSink for RecordingSink {
        async fn report_location(&self, report: &LocationReport) -> Result<()> {
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        }
    }

    /// Rejects every report and counts how often it was asked.
    #[derive(Default)]
    struct RejectingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LocationSink for RejectingSink {
        async fn report_location(&self, _report: &LocationReport) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CompanionError::ServerError { status: 500, message: None })
        }
    }

    struct Harness {
        reporter: LocationReporter,
        sink: Arc<RecordingSink>,
        permission: Arc<CountingPermission>,
        notifications: mpsc::Receiver<Notification>,
    }

    async fn harness(
        email: Option<&str>,
        outcome: PermissionOutcome,
        positions: Arc<dyn PositionProvider>,
    ) -> Harness {
        let store = Arc::new(MemoryStore::new());
        if let Some(email) = email {
            store.set(EMAIL_KEY, email).await.unwrap();
        }
        let permission = Arc::new(CountingPermission { outcome, requests: AtomicUsize::new(0) });
        let sink = Arc::new(RecordingSink::default());
        let (notifier, notifications) = Notifier::channel(64);

        let mut reporter =
            LocationReporter::new(store, permission.clone(), positions, sink.clone(), notifier);
        reporter.initialize().await;

        Harness { reporter, sink, permission, notifications }
    }

    fn fixed() -> Arc<dyn PositionProvider> {
        Arc::new(FixedPosition::new(12.34, 56.78))
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_and_reports_email() {
        let mut h = harness(Some("a@b.com"), PermissionOutcome::Granted, fixed()).await;

        h.reporter.start().unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;

        let reports = h.sink.reports.lock().unwrap().clone();
        assert_eq!(reports.len(), 3);
        assert_eq!(
            reports[0],
            LocationReport { latitude: 12.34, longitude: 56.78, email: "a@b.com".to_string() }
        );
        let last = h.reporter.status().last_position.unwrap();
        assert_eq!((last.latitude, last.longitude), (12.34, 56.78));
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_keeps_a_single_timer() {
        let mut h = harness(Some("a@b.com"), PermissionOutcome::Granted, fixed()).await;

        h.reporter.start().unwrap();
        h.reporter.start().unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(h.reporter.has_timer());
        assert_eq!(h.sink.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_then_teardown_leaves_no_ticks() {
        let mut h = harness(Some("a@b.com"), PermissionOutcome::Granted, fixed()).await;

        h.reporter.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        h.reporter.stop();
        assert!(!h.reporter.has_timer());
        assert!(!h.reporter.is_active());

        let sink = h.sink.clone();
        drop(h);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(sink.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_while_active_cancels_the_timer() {
        let mut h = harness(Some("a@b.com"), PermissionOutcome::Granted, fixed()).await;
        h.reporter.start().unwrap();

        let sink = h.sink.clone();
        drop(h.reporter);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(sink.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_email_is_missing_account() {
        let mut h = harness(None, PermissionOutcome::Granted, fixed()).await;

        let result = h.reporter.start();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(matches!(result, Err(CompanionError::MissingAccount)));
        assert!(!h.reporter.has_timer());
        assert_eq!(h.sink.count(), 0);
        let alert = h.notifications.recv().await.unwrap();
        assert_eq!(alert.message, "Email not found. Cannot start tracking.");
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_alternates_regardless_of_outcome() {
        let mut h = harness(None, PermissionOutcome::Granted, fixed()).await;

        assert!(h.reporter.toggle());
        assert!(!h.reporter.has_timer());
        assert!(!h.reporter.toggle());
        assert!(h.reporter.toggle());
        assert!(!h.reporter.toggle());
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_drives_the_timer_when_account_is_known() {
        let mut h = harness(Some("a@b.com"), PermissionOutcome::Granted, fixed()).await;

        assert!(h.reporter.toggle());
        assert!(h.reporter.has_timer());
        assert!(!h.reporter.toggle());
        assert!(!h.reporter.has_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_read_does_not_stop_the_session() {
        let positions = Arc::new(FlakyPosition {
            calls: AtomicUsize::new(0),
            failing: vec![0],
            stall_instead: false,
        });
        let mut h = harness(Some("a@b.com"), PermissionOutcome::Granted, positions.clone()).await;

        h.reporter.start().unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(positions.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.sink.count(), 1);
        assert!(h.reporter.is_active());
        assert_eq!(h.reporter.status().last_error.as_deref(), Some("Position unavailable: no fix"));
        assert_eq!(h.notifications.recv().await.unwrap().title, "Location Error");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_read_times_out_while_ticks_continue() {
        let positions = Arc::new(FlakyPosition {
            calls: AtomicUsize::new(0),
            failing: vec![0],
            stall_instead: true,
        });
        let mut h = harness(Some("a@b.com"), PermissionOutcome::Granted, positions.clone()).await;

        h.reporter.start().unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(h.sink.count(), 2);
        assert!(h.reporter.status().last_error.is_none());

        tokio::time::sleep(Duration::from_secs(13)).await;
        assert_eq!(
            h.reporter.status().last_error.as_deref(),
            Some("Location request timed out after 15s")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn denied_permission_fails_samples_without_stopping() {
        let positions = Arc::new(FlakyPosition {
            calls: AtomicUsize::new(0),
            failing: vec![],
            stall_instead: false,
        });
        let mut h = harness(Some("a@b.com"), PermissionOutcome::Denied, positions.clone()).await;

        h.reporter.start().unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(positions.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.sink.count(), 0);
        assert!(h.reporter.has_timer());
        assert_eq!(
            h.reporter.status().last_error.as_deref(),
            Some("Location permission denied")
        );
    }

    #[tokio::test]
    async fn permission_is_requested_once() {
        let mut h = harness(Some("a@b.com"), PermissionOutcome::Denied, fixed()).await;

        h.reporter.initialize().await;

        assert_eq!(h.permission.requests.load(Ordering::SeqCst), 1);
        assert_eq!(h.reporter.permission(), Some(PermissionOutcome::Denied));
        assert_eq!(h.reporter.account_email(), Some("a@b.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn new_email_applies_on_restart() {
        let mut h = harness(None, PermissionOutcome::Granted, fixed()).await;

        h.reporter.set_account_email("c@d.com");
        h.reporter.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(h.sink.reports.lock().unwrap()[0].email, "c@d.com");
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_reports_are_sent_once_per_tick() {
        let store = Arc::new(MemoryStore::new());
        store.set(EMAIL_KEY, "a@b.com").await.unwrap();
        let sink = Arc::new(RejectingSink::default());
        let (notifier, mut notifications) = Notifier::channel(64);
        let mut reporter = LocationReporter::new(
            store,
            Arc::new(NoPermissionRequired),
            fixed(),
            sink.clone(),
            notifier,
        );
        reporter.initialize().await;

        reporter.start().unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert!(reporter.has_timer());

        reporter.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);

        let mut errors = 0;
        while let Ok(n) = notifications.try_recv() {
            assert_eq!(n.title, "Tracking Error");
            errors += 1;
        }
        assert_eq!(errors, 3);
    }
}
