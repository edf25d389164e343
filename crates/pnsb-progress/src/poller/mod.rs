//! Periodic refresh of the derived dashboard.
//!
//! The poller is the only owner of the current snapshot. Every refresh
//! replaces the snapshot and dashboard references wholesale; readers get
//! `Arc` clones and never observe a half-updated view.

mod cache;

pub use cache::SnapshotCache;

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{NaiveDateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RefreshConfig;
use crate::ingest::{SnapshotError, SnapshotSource};
use crate::survey::{
    AlertConfig, AlertRuleEngine, DataSnapshot, ProgressDashboard, SurveyCalendar,
};

/// Inputs the poller needs besides its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerSettings {
    pub calendar: SurveyCalendar,
    pub alerts: AlertConfig,
    pub refresh: RefreshConfig,
}

impl PollerSettings {
    /// Forced verification cadence, from the alert settings in minutes.
    pub fn verification_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.alerts.intervalo_verificacao) * 60)
    }
}

#[derive(Debug, Default)]
struct PollerState {
    snapshot: Option<Arc<DataSnapshot>>,
    dashboard: Option<Arc<ProgressDashboard>>,
}

pub struct ProgressPoller<S> {
    source: S,
    settings: PollerSettings,
    cache: Mutex<SnapshotCache>,
    state: RwLock<PollerState>,
}

impl<S> ProgressPoller<S>
where
    S: SnapshotSource,
{
    pub fn new(source: S, settings: PollerSettings) -> Self {
        Self {
            source,
            cache: Mutex::new(SnapshotCache::new(settings.refresh.cache_ttl)),
            settings,
            state: RwLock::new(PollerState::default()),
        }
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.settings
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Latest dashboard, if a refresh has completed.
    pub fn dashboard(&self) -> Option<Arc<ProgressDashboard>> {
        self.read_state().dashboard.clone()
    }

    pub fn snapshot(&self) -> Option<Arc<DataSnapshot>> {
        self.read_state().snapshot.clone()
    }

    /// Rebuild the whole dashboard, serving the snapshot from cache while
    /// it is fresh.
    pub fn refresh_kpis(
        &self,
        now: NaiveDateTime,
    ) -> Result<Arc<ProgressDashboard>, SnapshotError> {
        let snapshot = self.load_snapshot(Instant::now())?;
        Ok(self.rebuild(snapshot, now))
    }

    /// Re-evaluate alerts only. Falls back to a full rebuild when the
    /// snapshot changed or nothing has been built yet.
    pub fn refresh_alerts(
        &self,
        now: NaiveDateTime,
    ) -> Result<Arc<ProgressDashboard>, SnapshotError> {
        let snapshot = self.load_snapshot(Instant::now())?;
        let Some(current) = self.dashboard_for(&snapshot) else {
            return Ok(self.rebuild(snapshot, now));
        };
        let dashboard = self.evaluate_alerts(&snapshot, &current, now);
        Ok(self.commit_alerts(&snapshot, dashboard))
    }

    /// Fetch from the source regardless of cache freshness.
    pub fn verify(
        &self,
        now: NaiveDateTime,
    ) -> Result<Arc<ProgressDashboard>, SnapshotError> {
        let fetched = Arc::new(self.source.fetch()?);
        self.lock_cache().store(Arc::clone(&fetched), Instant::now());
        info!(source = %self.source.describe(), "snapshot verified");
        Ok(self.rebuild(fetched, now))
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
        debug!("snapshot cache cleared");
    }

    fn load_snapshot(&self, at: Instant) -> Result<Arc<DataSnapshot>, SnapshotError> {
        if let Some(snapshot) = self.lock_cache().fresh(at) {
            debug!("snapshot cache hit");
            return Ok(snapshot);
        }

        match self.source.fetch() {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.lock_cache().store(Arc::clone(&snapshot), at);
                info!(
                    source = %self.source.describe(),
                    entities = snapshot.entities.len(),
                    visits = snapshot.visits.len(),
                    "snapshot fetched"
                );
                Ok(snapshot)
            }
            Err(err) => match self.lock_cache().last() {
                Some(stale) => {
                    warn!(error = %err, "snapshot fetch failed; using last cached snapshot");
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }

    /// Dashboard built from exactly this snapshot, if it is the current one.
    fn dashboard_for(&self, snapshot: &Arc<DataSnapshot>) -> Option<Arc<ProgressDashboard>> {
        let state = self.read_state();
        match (&state.snapshot, &state.dashboard) {
            (Some(previous), Some(dashboard)) if Arc::ptr_eq(previous, snapshot) => {
                Some(Arc::clone(dashboard))
            }
            _ => None,
        }
    }

    fn evaluate_alerts(
        &self,
        snapshot: &DataSnapshot,
        current: &ProgressDashboard,
        now: NaiveDateTime,
    ) -> Arc<ProgressDashboard> {
        let alerts = AlertRuleEngine::new(self.settings.alerts).evaluate_rows(
            snapshot,
            &current.municipalities,
            now,
        );
        debug!(alerts = alerts.len(), "alerts refreshed");
        Arc::new(current.clone().with_alerts(alerts))
    }

    /// Store alerts evaluated against `evaluated`. A rebuild from a newer
    /// snapshot that landed meanwhile wins.
    fn commit_alerts(
        &self,
        evaluated: &Arc<DataSnapshot>,
        dashboard: Arc<ProgressDashboard>,
    ) -> Arc<ProgressDashboard> {
        let mut state = self.write_state();
        let unchanged = state
            .snapshot
            .as_ref()
            .is_some_and(|snapshot| Arc::ptr_eq(snapshot, evaluated));
        if !unchanged {
            debug!("snapshot replaced during alert refresh; keeping newer dashboard");
            return state.dashboard.clone().unwrap_or(dashboard);
        }
        state.dashboard = Some(Arc::clone(&dashboard));
        dashboard
    }

    fn rebuild(&self, snapshot: Arc<DataSnapshot>, now: NaiveDateTime) -> Arc<ProgressDashboard> {
        let dashboard = Arc::new(ProgressDashboard::build(
            &snapshot,
            &self.settings.alerts,
            &self.settings.calendar,
            now,
        ));
        info!(
            kpi_version = %dashboard.kpis.version,
            municipalities = dashboard.municipalities.len(),
            alerts = dashboard.alerts.len(),
            "dashboard rebuilt"
        );

        let mut state = self.write_state();
        state.snapshot = Some(snapshot);
        state.dashboard = Some(Arc::clone(&dashboard));
        dashboard
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, SnapshotCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, PollerState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, PollerState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn wall_clock() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl<S> ProgressPoller<S>
where
    S: SnapshotSource + 'static,
{
    /// Start the refresh loops. Intervals of zero disable their loop.
    pub fn spawn(self: &Arc<Self>) -> PollerHandle {
        let refresh = self.settings.refresh;
        let mut tasks = Vec::new();

        if let Some(task) = self.every(refresh.kpi_interval, |poller| {
            if let Err(err) = poller.refresh_kpis(wall_clock()) {
                error!("kpi refresh error: {err}");
            }
        }) {
            tasks.push(task);
        }

        if let Some(task) = self.every(refresh.alert_interval, |poller| {
            if let Err(err) = poller.refresh_alerts(wall_clock()) {
                error!("alert refresh error: {err}");
            }
        }) {
            tasks.push(task);
        }

        if let Some(task) = self.every(refresh.cache_clear_interval, |poller| {
            poller.clear_cache();
        }) {
            tasks.push(task);
        }

        if let Some(task) = self.every(self.settings.verification_interval(), |poller| {
            if let Err(err) = poller.verify(wall_clock()) {
                error!("snapshot verification error: {err}");
            }
        }) {
            tasks.push(task);
        }

        info!(tasks = tasks.len(), "progress poller started");
        PollerHandle { tasks }
    }

    /// Run `job` every `period` on the blocking pool; fetches read files
    /// synchronously.
    fn every<F>(self: &Arc<Self>, period: Duration, job: F) -> Option<JoinHandle<()>>
    where
        F: Fn(&Self) + Send + Sync + 'static,
    {
        if period.is_zero() {
            return None;
        }
        let me = Arc::clone(self);
        let job = Arc::new(job);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let poller = Arc::clone(&me);
                let job = Arc::clone(&job);
                if let Err(err) = tokio::task::spawn_blocking(move || job(&poller)).await {
                    error!("poller job failed: {err}");
                }
            }
        }))
    }
}

/// Running refresh loops.
#[derive(Debug)]
pub struct PollerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{parse_datetime, StaticSource};
    use crate::survey::{Entity, MunicipalityStatus, Priority, QuestionnaireStatus};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn at(raw: &str) -> NaiveDateTime {
        parse_datetime(raw).expect("timestamp")
    }

    fn validated_p1(municipality: &str) -> Entity {
        Entity {
            municipality: municipality.to_string(),
            priority: Some(Priority::P1),
            mrs_required: true,
            map_required: true,
            status_mrs: QuestionnaireStatus::ValidatedComplete,
            status_map: QuestionnaireStatus::ValidatedComplete,
            ..Entity::default()
        }
    }

    struct CountingSource {
        inner: StaticSource,
        fetches: AtomicUsize,
        failing: AtomicBool,
    }

    impl CountingSource {
        fn new(snapshot: DataSnapshot) -> Self {
            Self {
                inner: StaticSource::new(snapshot),
                fetches: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl SnapshotSource for CountingSource {
        fn fetch(&self) -> Result<DataSnapshot, SnapshotError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(SnapshotError::Unavailable("backend offline".to_string()));
            }
            self.inner.fetch()
        }
    }

    fn poller(snapshot: DataSnapshot) -> ProgressPoller<CountingSource> {
        ProgressPoller::new(CountingSource::new(snapshot), PollerSettings::default())
    }

    fn poller_with_failing_source() -> ProgressPoller<CountingSource> {
        let poller = poller(DataSnapshot::default());
        poller.source().failing.store(true, Ordering::SeqCst);
        poller
    }

    #[test]
    fn refresh_builds_dashboard_and_reuses_fresh_cache() {
        let poller = poller(DataSnapshot::default());
        assert!(poller.dashboard().is_none());

        let first = poller.refresh_kpis(at("2025-05-01")).expect("refresh");
        assert_eq!(first.municipalities.len(), 11);
        poller.refresh_kpis(at("2025-05-01")).expect("refresh");
        assert_eq!(poller.source().fetches(), 1);

        poller.verify(at("2025-05-01")).expect("verify");
        assert_eq!(poller.source().fetches(), 2);
    }

    #[test]
    fn failed_fetch_falls_back_to_last_snapshot() {
        let poller = poller(DataSnapshot::default());
        assert!(poller.refresh_kpis(at("2025-05-01")).is_ok());

        poller.clear_cache();
        poller.source().failing.store(true, Ordering::SeqCst);
        let stale = poller.refresh_kpis(at("2025-05-02")).expect("stale after clear");
        assert_eq!(poller.source().fetches(), 2);
        assert_eq!(stale.generated_at, at("2025-05-02"));

        let cold = poller_with_failing_source();
        assert!(cold.refresh_kpis(at("2025-05-01")).is_err());

        let fresh = ProgressPoller::new(
            CountingSource::new(DataSnapshot::default()),
            PollerSettings {
                refresh: RefreshConfig {
                    cache_ttl: Duration::ZERO,
                    ..RefreshConfig::default()
                },
                ..PollerSettings::default()
            },
        );
        assert!(fresh.refresh_kpis(at("2025-05-01")).is_ok());
        fresh.source().failing.store(true, Ordering::SeqCst);
        let dashboard = fresh.refresh_kpis(at("2025-05-02")).expect("stale fallback");
        assert_eq!(dashboard.generated_at, at("2025-05-02"));
    }

    #[test]
    fn replaced_snapshot_is_picked_up_after_cache_clear() {
        let poller = poller(DataSnapshot::default());
        poller.refresh_kpis(at("2025-05-01")).expect("refresh");
        let before = poller.dashboard().expect("dashboard");
        let penha = before.municipality("Penha").expect("row");
        assert_eq!(penha.status, MunicipalityStatus::NoVisit);

        poller.source().inner.replace(DataSnapshot {
            entities: vec![validated_p1("Penha")],
            ..DataSnapshot::default()
        });
        poller.clear_cache();
        let after = poller.refresh_alerts(at("2025-05-01")).expect("refresh");
        let penha = after.municipality("Penha").expect("row");
        assert_eq!(penha.status, MunicipalityStatus::Done);
        assert_eq!(
            before.municipality("Penha").map(|row| row.status),
            Some(MunicipalityStatus::NoVisit)
        );
    }

    #[test]
    fn alert_refresh_keeps_kpis() {
        let poller = poller(DataSnapshot::default());
        let built = poller.refresh_kpis(at("2025-05-01")).expect("refresh");
        let refreshed = poller.refresh_alerts(at("2025-05-03")).expect("alerts");
        assert_eq!(refreshed.kpis, built.kpis);
        assert_eq!(refreshed.generated_at, built.generated_at);
        assert_eq!(refreshed.alerts.len(), built.alerts.len());
    }

    #[test]
    fn alerts_evaluated_on_replaced_snapshot_are_discarded() {
        let poller = poller(DataSnapshot::default());
        poller.refresh_kpis(at("2025-05-01")).expect("refresh");
        let old_snapshot = poller.snapshot().expect("snapshot");
        let current = poller.dashboard_for(&old_snapshot).expect("current dashboard");
        let stale = poller.evaluate_alerts(&old_snapshot, &current, at("2025-05-03"));

        poller.source().inner.replace(DataSnapshot {
            entities: vec![validated_p1("Penha")],
            ..DataSnapshot::default()
        });
        let verified = poller.verify(at("2025-05-03")).expect("verify");

        let kept = poller.commit_alerts(&old_snapshot, stale);
        assert!(Arc::ptr_eq(&kept, &verified));
        let stored = poller.dashboard().expect("dashboard");
        assert!(Arc::ptr_eq(&stored, &verified));
        assert!(!Arc::ptr_eq(&poller.snapshot().expect("snapshot"), &old_snapshot));
        assert_eq!(
            stored.municipality("Penha").map(|row| row.status),
            Some(MunicipalityStatus::Done)
        );
    }

    #[test]
    fn alerts_commit_when_snapshot_is_unchanged() {
        let poller = poller(DataSnapshot::default());
        let built = poller.refresh_kpis(at("2025-05-01")).expect("refresh");
        let snapshot = poller.snapshot().expect("snapshot");
        let evaluated = poller.evaluate_alerts(&snapshot, &built, at("2025-05-20"));

        let stored = poller.commit_alerts(&snapshot, Arc::clone(&evaluated));
        assert!(Arc::ptr_eq(&stored, &evaluated));
        assert!(Arc::ptr_eq(&poller.dashboard().expect("dashboard"), &evaluated));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn spawned_loops_refresh_and_shut_down() {
        let poller = Arc::new(poller(DataSnapshot::default()));
        let handle = poller.spawn();
        assert_eq!(handle.task_count(), 4);

        for _ in 0..50 {
            if poller.dashboard().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(poller.dashboard().is_some());
        handle.shutdown();
    }
}
