mod config;
mod domain;
mod lifecycle;
mod rules;

pub use config::AlertConfig;
pub use domain::{
    Alert, AlertAction, AlertCategory, AlertPriority, AlertSeverity, AlertStatus,
};
pub use lifecycle::{
    AlertHistory, AlertHistoryError, AlertHistoryRepository, AlertLifecycleError, AlertRecord,
    HISTORY_RETENTION_DAYS,
};
pub use rules::contact_success_rate;

use std::cmp::Reverse;

use chrono::NaiveDateTime;
use tracing::debug;

use super::rows::{municipality_rows, MunicipalityRow};
use super::snapshot::DataSnapshot;

/// Stateless rule engine. Only ever emits active candidates; the caller
/// owns acknowledgement through [`AlertHistory`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertRuleEngine {
    config: AlertConfig,
}

impl AlertRuleEngine {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn evaluate(&self, snapshot: &DataSnapshot, now: NaiveDateTime) -> Vec<Alert> {
        let rows = municipality_rows(snapshot);
        self.evaluate_rows(snapshot, &rows, now)
    }

    pub fn evaluate_rows(
        &self,
        snapshot: &DataSnapshot,
        rows: &[MunicipalityRow],
        now: NaiveDateTime,
    ) -> Vec<Alert> {
        let mut alerts = rules::stale_no_contact(rows, &self.config, now);
        alerts.extend(rules::execution_slippage(rows, &self.config, now));
        alerts.extend(rules::incomplete_data(rows, &self.config, now));
        alerts.extend(rules::low_contact_success(&snapshot.visits, &self.config, now));
        alerts.extend(rules::slow_progress(rows, now));

        alerts.sort_by_key(|alert| Reverse(alert.priority.rank()));
        debug!(count = alerts.len(), "evaluated alert rules");
        alerts
    }
}

/// Alert candidates for the snapshot, highest priority first.
pub fn evaluate_alerts(
    snapshot: &DataSnapshot,
    config: &AlertConfig,
    now: NaiveDateTime,
) -> Vec<Alert> {
    AlertRuleEngine::new(*config).evaluate(snapshot, now)
}
