use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use metrics_exporter_prometheus::PrometheusHandle;
use pnsb_progress::ingest::{JsonFileSource, SnapshotError, SnapshotSource, StaticSource};
use pnsb_progress::survey::{
    AlertHistory, AlertHistoryError, AlertHistoryRepository, DataSnapshot,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Acknowledgement ledger kept for the lifetime of the process.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAlertHistory {
    history: Arc<Mutex<AlertHistory>>,
}

impl AlertHistoryRepository for InMemoryAlertHistory {
    fn load(&self) -> Result<AlertHistory, AlertHistoryError> {
        let guard = self
            .history
            .lock()
            .map_err(|_| AlertHistoryError::Unavailable("history mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, history: &AlertHistory) -> Result<(), AlertHistoryError> {
        let mut guard = self
            .history
            .lock()
            .map_err(|_| AlertHistoryError::Unavailable("history mutex poisoned".to_string()))?;
        *guard = history.clone();
        Ok(())
    }

    fn modify<T, E, F>(&self, update: F) -> Result<T, E>
    where
        F: FnOnce(&mut AlertHistory) -> Result<T, E>,
        E: From<AlertHistoryError>,
    {
        let mut guard = self
            .history
            .lock()
            .map_err(|_| AlertHistoryError::Unavailable("history mutex poisoned".to_string()))?;
        let mut draft = guard.clone();
        let value = update(&mut draft)?;
        *guard = draft;
        Ok(value)
    }
}

/// Snapshot source picked from configuration.
pub(crate) enum ConfiguredSource {
    File(JsonFileSource),
    Empty(StaticSource),
}

impl ConfiguredSource {
    pub(crate) fn from_path(path: Option<std::path::PathBuf>) -> Self {
        match path {
            Some(path) => Self::File(JsonFileSource::new(path)),
            None => Self::Empty(StaticSource::new(DataSnapshot::default())),
        }
    }
}

impl SnapshotSource for ConfiguredSource {
    fn fetch(&self) -> Result<DataSnapshot, SnapshotError> {
        match self {
            Self::File(source) => source.fetch(),
            Self::Empty(source) => source.fetch(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::File(source) => source.describe(),
            Self::Empty(source) => source.describe(),
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Start of the given day.
pub(crate) fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnsb_progress::survey::AlertStatus;

    #[test]
    fn history_round_trips_through_memory() {
        let repository = InMemoryAlertHistory::default();
        let mut history = repository.load().expect("load");
        let now = day_start(NaiveDate::from_ymd_opt(2025, 5, 1).expect("date"));
        history.ignore("progresso_lento", now).expect("ignore");
        repository.save(&history).expect("save");

        let reloaded = repository.load().expect("reload");
        assert_eq!(reloaded.status_of("progresso_lento"), AlertStatus::Ignored);
    }

    #[test]
    fn modify_holds_the_lock_across_updates() {
        let repository = InMemoryAlertHistory::default();
        let now = day_start(NaiveDate::from_ymd_opt(2025, 5, 1).expect("date"));

        let workers: Vec<_> = (0..8)
            .map(|n| {
                let repository = repository.clone();
                std::thread::spawn(move || {
                    repository.modify(|history| {
                        history
                            .ignore(&format!("sem_agendamento_{n}"), now)
                            .map(|_| ())
                            .map_err(|err| AlertHistoryError::Unavailable(err.to_string()))
                    })
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker").expect("modify");
        }
        assert_eq!(repository.load().expect("load").len(), 8);

        let failed: Result<(), AlertHistoryError> = repository.modify(|history| {
            history.ignore("sem_agendamento_0", now).map_err(|err| {
                AlertHistoryError::Unavailable(err.to_string())
            })?;
            Ok(())
        });
        assert!(failed.is_err());
        assert_eq!(repository.load().expect("load").len(), 8);
    }

    #[test]
    fn parse_date_reports_the_offending_value() {
        assert!(parse_date("2025-05-01").is_ok());
        let err = parse_date("01/05/2025").unwrap_err();
        assert!(err.contains("01/05/2025"));
    }

    #[test]
    fn missing_snapshot_path_serves_empty_snapshot() {
        let source = ConfiguredSource::from_path(None);
        assert_eq!(source.fetch().expect("fetch"), DataSnapshot::default());
    }
}
