//! Strategic KPI set: trusted from the backend when it sends one, computed
//! from the snapshot otherwise.

mod backend;
mod local;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use super::domain::SurveyCalendar;
use super::rows::{municipality_rows, MunicipalityRow};
use super::snapshot::DataSnapshot;

pub use backend::{detect_schema, normalize_backend};
pub use local::{efficiency_score, quality_score};

pub const OFFICIAL_VERSION: &str = "2.0_pnsb_oficial";
pub const LEGACY_VERSION: &str = "1.0_legacy";
pub const LOCAL_VERSION: &str = "local";

pub(crate) const UNDEFINED: &str = "indefinido";
pub(crate) const UNDEFINED_FEMININE: &str = "indefinida";
pub(crate) const DEFAULT_RISK: &str = "baixo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiSchema {
    Official,
    Legacy,
    Local,
}

impl KpiSchema {
    pub const fn version(self) -> &'static str {
        match self {
            Self::Official => OFFICIAL_VERSION,
            Self::Legacy => LEGACY_VERSION,
            Self::Local => LOCAL_VERSION,
        }
    }
}

/// Normalized KPI shape regardless of where the figures came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSnapshot {
    pub schema: KpiSchema,
    pub version: &'static str,
    pub days_remaining: u32,
    pub time_progress_pct: f64,
    pub schedule_status: String,
    pub municipalities_completed: u32,
    pub coverage_pct: f64,
    pub compliance_p1_pct: f64,
    pub compliance_status: String,
    pub mrs_response_rate: f64,
    pub mrs_status: String,
    pub map_response_rate: f64,
    pub map_status: String,
    pub quality_score: f64,
    pub quality_label: String,
    pub efficiency_pct: f64,
    pub visits_completed: u32,
    pub visits_total: u32,
    pub risk_level: String,
    pub risk_score: f64,
    /// Metrics that had no input data and were reported as zero.
    pub insufficient_data: Vec<&'static str>,
}

impl KpiSnapshot {
    pub fn empty(schema: KpiSchema) -> Self {
        Self {
            schema,
            version: schema.version(),
            days_remaining: 0,
            time_progress_pct: 0.0,
            schedule_status: UNDEFINED.to_string(),
            municipalities_completed: 0,
            coverage_pct: 0.0,
            compliance_p1_pct: 0.0,
            compliance_status: UNDEFINED.to_string(),
            mrs_response_rate: 0.0,
            mrs_status: UNDEFINED.to_string(),
            map_response_rate: 0.0,
            map_status: UNDEFINED.to_string(),
            quality_score: 0.0,
            quality_label: UNDEFINED_FEMININE.to_string(),
            efficiency_pct: 0.0,
            visits_completed: 0,
            visits_total: 0,
            risk_level: DEFAULT_RISK.to_string(),
            risk_score: 0.0,
            insufficient_data: Vec::new(),
        }
    }

    /// Every percentage field, for range checks.
    pub fn percentages(&self) -> [(&'static str, f64); 8] {
        [
            ("time_progress_pct", self.time_progress_pct),
            ("coverage_pct", self.coverage_pct),
            ("compliance_p1_pct", self.compliance_p1_pct),
            ("mrs_response_rate", self.mrs_response_rate),
            ("map_response_rate", self.map_response_rate),
            ("quality_score", self.quality_score),
            ("efficiency_pct", self.efficiency_pct),
            ("risk_score", self.risk_score),
        ]
    }
}

/// Stateless KPI calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct KpiCalculator {
    calendar: SurveyCalendar,
}

impl KpiCalculator {
    pub fn new(calendar: SurveyCalendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &SurveyCalendar {
        &self.calendar
    }

    pub fn compute(&self, snapshot: &DataSnapshot, now: NaiveDateTime) -> KpiSnapshot {
        let rows = municipality_rows(snapshot);
        self.compute_with_rows(snapshot, &rows, now)
    }

    /// Same as [`compute`](Self::compute) when the caller already derived
    /// the municipality rows.
    pub fn compute_with_rows(
        &self,
        snapshot: &DataSnapshot,
        rows: &[MunicipalityRow],
        now: NaiveDateTime,
    ) -> KpiSnapshot {
        let schema = detect_schema(snapshot);
        debug!(schema = schema.version(), "computing KPIs");

        match (&snapshot.kpis, schema) {
            (Some(kpis), KpiSchema::Official | KpiSchema::Legacy) => normalize_backend(kpis, schema),
            _ => local::compute_local(snapshot, rows, &self.calendar, now),
        }
    }
}

pub fn compute_kpis(
    snapshot: &DataSnapshot,
    calendar: &SurveyCalendar,
    now: NaiveDateTime,
) -> KpiSnapshot {
    KpiCalculator::new(*calendar).compute(snapshot, now)
}

pub(crate) fn clamp_pct(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
