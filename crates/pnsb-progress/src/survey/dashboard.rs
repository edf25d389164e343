use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::alerts::{Alert, AlertConfig, AlertRuleEngine, AlertSeverity};
use super::checklist::ChecklistCompleteness;
use super::daily::{daily_statistics, DailyStatistics};
use super::domain::SurveyCalendar;
use super::kpi::{KpiCalculator, KpiSnapshot};
use super::pipeline::{PipelineBuckets, PipelineSummary};
use super::rows::{municipality_rows, MunicipalityRow};
use super::snapshot::DataSnapshot;
use super::status::MunicipalityStatus;

/// Everything derived from one snapshot. Built in one pass and never
/// updated in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressDashboard {
    pub generated_at: NaiveDateTime,
    pub snapshot_updated_at: Option<NaiveDateTime>,
    pub kpis: KpiSnapshot,
    pub municipalities: Vec<MunicipalityRow>,
    pub pipeline: PipelineBuckets,
    pub pipeline_summary: PipelineSummary,
    pub alerts: Vec<Alert>,
    pub daily: DailyStatistics,
    pub checklists: BTreeMap<String, ChecklistCompleteness>,
}

impl ProgressDashboard {
    pub fn build(
        snapshot: &DataSnapshot,
        alert_config: &AlertConfig,
        calendar: &SurveyCalendar,
        now: NaiveDateTime,
    ) -> Self {
        let rows = municipality_rows(snapshot);
        let kpis = KpiCalculator::new(*calendar).compute_with_rows(snapshot, &rows, now);
        let alerts = AlertRuleEngine::new(*alert_config).evaluate_rows(snapshot, &rows, now);

        let mut pipeline = PipelineBuckets::empty();
        for row in &rows {
            pipeline.insert(&row.name, row.pipeline.clone());
        }
        let pipeline_summary = pipeline.summary();

        let checklists = snapshot
            .checklists
            .iter()
            .map(|(municipality, record)| (municipality.clone(), record.completeness()))
            .collect();

        Self {
            generated_at: now,
            snapshot_updated_at: snapshot.last_updated,
            kpis,
            municipalities: rows,
            pipeline,
            pipeline_summary,
            alerts,
            daily: daily_statistics(snapshot, now),
            checklists,
        }
    }

    /// Swap in a freshly evaluated alert list, keeping everything else.
    pub fn with_alerts(mut self, alerts: Vec<Alert>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn municipality(&self, name: &str) -> Option<&MunicipalityRow> {
        self.municipalities
            .iter()
            .find(|row| crate::ingest::same_municipality(&row.name, name))
    }

    pub fn summary(&self) -> DashboardSummary {
        let statuses = MunicipalityStatus::ordered()
            .into_iter()
            .map(|status| StatusCount {
                status,
                label: status.label(),
                count: self
                    .municipalities
                    .iter()
                    .filter(|row| row.status == status)
                    .count(),
            })
            .collect();

        let count_severity = |severity: AlertSeverity| {
            self.alerts
                .iter()
                .filter(|alert| alert.severity == severity)
                .count()
        };

        DashboardSummary {
            generated_at: self.generated_at,
            kpi_version: self.kpis.version,
            days_remaining: self.kpis.days_remaining,
            coverage_pct: self.kpis.coverage_pct,
            compliance_p1_pct: self.kpis.compliance_p1_pct,
            efficiency_pct: self.kpis.efficiency_pct,
            municipalities: self.municipalities.len(),
            statuses,
            in_progress_pipeline: self.pipeline_summary.in_progress,
            finalized_pipeline: self.pipeline_summary.finalized,
            needs_triage: self.pipeline_summary.needs_triage,
            alerts: AlertCounts {
                critical: count_severity(AlertSeverity::Critical),
                important: count_severity(AlertSeverity::Important),
                info: count_severity(AlertSeverity::Info),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: MunicipalityStatus,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AlertCounts {
    pub critical: usize,
    pub important: usize,
    pub info: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub generated_at: NaiveDateTime,
    pub kpi_version: &'static str,
    pub days_remaining: u32,
    pub coverage_pct: f64,
    pub compliance_p1_pct: f64,
    pub efficiency_pct: f64,
    pub municipalities: usize,
    pub statuses: Vec<StatusCount>,
    pub in_progress_pipeline: usize,
    pub finalized_pipeline: usize,
    pub needs_triage: usize,
    pub alerts: AlertCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{parse_datetime, SnapshotImporter};

    #[test]
    fn dashboard_composes_every_view() {
        let snapshot = SnapshotImporter::from_json_str(
            r#"{
                "entidades": [
                    {"municipio": "Penha", "prioridade": 1, "mrs_obrigatorio": true,
                     "status_mrs": "validado_concluido", "status_map": "validado_concluido"}
                ],
                "visitas": [{"municipio": "Penha", "data": "2025-05-10", "status": "finalizada"}],
                "checklists": {"Penha": {"apos": {"relatorio_resumo": true}}}
            }"#,
        )
        .expect("snapshot");
        let now = parse_datetime("2025-05-20").expect("now");

        let dashboard = ProgressDashboard::build(
            &snapshot,
            &AlertConfig::default(),
            &SurveyCalendar::default(),
            now,
        );

        assert_eq!(dashboard.municipalities.len(), 11);
        assert_eq!(dashboard.pipeline.total(), 11);
        assert_eq!(dashboard.pipeline_summary.finalized, 1);
        assert_eq!(dashboard.kpis.municipalities_completed, 1);
        assert_eq!(dashboard.checklists["Penha"].completed, 1);
        assert_eq!(
            dashboard.municipality("penha").map(|row| row.status),
            Some(MunicipalityStatus::Done)
        );

        let summary = dashboard.summary();
        assert_eq!(summary.statuses[2].count, 1);
        assert_eq!(summary.alerts.critical, 10);
        assert_eq!(summary.kpi_version, "local");
    }
}
