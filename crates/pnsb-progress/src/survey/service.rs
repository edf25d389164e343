use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::alerts::{
    Alert, AlertConfig, AlertHistory, AlertHistoryError, AlertHistoryRepository,
    AlertLifecycleError, AlertRecord, AlertStatus,
};
use super::dashboard::ProgressDashboard;
use super::domain::SurveyCalendar;
use super::kpi::KpiSnapshot;
use super::pipeline::{PipelineBuckets, PipelineState, PipelineStateView, PipelineSummary};
use super::rows::MunicipalityRow;
use super::snapshot::DataSnapshot;
use crate::ingest::{lenient, SnapshotError, SnapshotSource};
use crate::poller::ProgressPoller;

/// Ad-hoc computation over a caller-supplied snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub snapshot: DataSnapshot,
    #[serde(default, deserialize_with = "lenient::opt_datetime")]
    pub now: Option<NaiveDateTime>,
    #[serde(default)]
    pub alert_config: Option<AlertConfig>,
    #[serde(default)]
    pub calendar: Option<SurveyCalendar>,
}

/// Read side over the poller plus the alert acknowledgement ledger.
pub struct ProgressService<S, H> {
    poller: Arc<ProgressPoller<S>>,
    history: Arc<H>,
}

impl<S, H> ProgressService<S, H>
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    pub fn new(poller: Arc<ProgressPoller<S>>, history: Arc<H>) -> Self {
        Self { poller, history }
    }

    pub fn poller(&self) -> &Arc<ProgressPoller<S>> {
        &self.poller
    }

    /// Current dashboard with acknowledged alerts removed. Builds one on
    /// demand when the poller has not refreshed yet.
    pub fn dashboard(&self, now: NaiveDateTime) -> Result<ProgressDashboard, ProgressServiceError> {
        let current = self.current(now)?;
        let alerts = self.history.load()?.suppress_acknowledged(current.alerts.clone());
        Ok((*current).clone().with_alerts(alerts))
    }

    pub fn kpis(&self, now: NaiveDateTime) -> Result<KpiSnapshot, ProgressServiceError> {
        Ok(self.current(now)?.kpis.clone())
    }

    pub fn municipalities(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<MunicipalityRow>, ProgressServiceError> {
        Ok(self.current(now)?.municipalities.clone())
    }

    pub fn pipeline(
        &self,
        now: NaiveDateTime,
    ) -> Result<(PipelineBuckets, PipelineSummary), ProgressServiceError> {
        let current = self.current(now)?;
        Ok((current.pipeline.clone(), current.pipeline_summary.clone()))
    }

    pub fn pipeline_states(&self) -> Vec<PipelineStateView> {
        PipelineState::ALL.iter().map(|state| state.view()).collect()
    }

    /// Active alert candidates the user has not resolved or ignored.
    pub fn alerts(&self, now: NaiveDateTime) -> Result<Vec<Alert>, ProgressServiceError> {
        let current = self.current(now)?;
        Ok(self.history.load()?.suppress_acknowledged(current.alerts.clone()))
    }

    /// Pure computation over the request's snapshot; the poller state is
    /// not touched.
    pub fn report(&self, request: ReportRequest) -> ProgressDashboard {
        let settings = self.poller.settings();
        let now = request.now.unwrap_or_else(|| Utc::now().naive_utc());
        let alert_config = request.alert_config.unwrap_or(settings.alerts);
        let calendar = request.calendar.unwrap_or(settings.calendar);
        ProgressDashboard::build(&request.snapshot, &alert_config, &calendar, now)
    }

    pub fn resolve(
        &self,
        alert_id: &str,
        now: NaiveDateTime,
    ) -> Result<AlertRecord, ProgressServiceError> {
        self.close(alert_id, AlertStatus::Resolved, now)
    }

    pub fn ignore(
        &self,
        alert_id: &str,
        now: NaiveDateTime,
    ) -> Result<AlertRecord, ProgressServiceError> {
        self.close(alert_id, AlertStatus::Ignored, now)
    }

    fn close(
        &self,
        alert_id: &str,
        status: AlertStatus,
        now: NaiveDateTime,
    ) -> Result<AlertRecord, ProgressServiceError> {
        let current = self.current(now)?;
        let acknowledge = |history: &mut AlertHistory| -> Result<AlertRecord, ProgressServiceError> {
            let known = current.alerts.iter().any(|alert| alert.id == alert_id)
                || history.get(alert_id).is_some();
            if !known {
                return Err(AlertLifecycleError::UnknownAlert(alert_id.to_string()).into());
            }

            let record = history.transition(alert_id, status, now)?.clone();
            history.retain_recent(now);
            Ok(record)
        };
        let record = self.history.modify(acknowledge)?;

        info!(alert = %alert_id, status = status.label(), "alert acknowledged");
        Ok(record)
    }

    fn current(&self, now: NaiveDateTime) -> Result<Arc<ProgressDashboard>, ProgressServiceError> {
        match self.poller.dashboard() {
            Some(dashboard) => Ok(dashboard),
            None => Ok(self.poller.refresh_kpis(now)?),
        }
    }
}

/// Error raised by the progress service.
#[derive(Debug, thiserror::Error)]
pub enum ProgressServiceError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Lifecycle(#[from] AlertLifecycleError),
    #[error(transparent)]
    History(#[from] AlertHistoryError),
}
