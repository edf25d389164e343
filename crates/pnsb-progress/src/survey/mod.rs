//! Pure survey progress derivations plus the service and router that
//! expose them.

mod alerts;
mod checklist;
mod daily;
mod dashboard;
mod domain;
mod kpi;
mod pipeline;
mod router;
mod rows;
mod service;
mod snapshot;
mod status;

pub use alerts::{
    contact_success_rate, evaluate_alerts, Alert, AlertAction, AlertCategory, AlertConfig,
    AlertHistory, AlertHistoryError, AlertHistoryRepository, AlertLifecycleError, AlertPriority,
    AlertRecord, AlertRuleEngine, AlertSeverity, AlertStatus, HISTORY_RETENTION_DAYS,
};
pub use checklist::{
    ChecklistCompleteness, ChecklistItem, ChecklistPhase, ChecklistRecord, MissingItem,
    PhaseCompleteness,
};
pub use daily::{
    daily_statistics, DailyStatistics, PendingActions, TodayStatistics, WeekStatistics,
    WEEKLY_VISIT_TARGET,
};
pub use dashboard::{AlertCounts, DashboardSummary, ProgressDashboard, StatusCount};
pub use domain::{
    AlertFlag, Entity, KnownMunicipality, MunicipalityRecord, Priority, ProgressSummary,
    QuestionnaireStatus, QuestionnaireSummary, SurveyCalendar, TimingSummary, Track, Visit,
};
pub use kpi::{
    compute_kpis, detect_schema, efficiency_score, normalize_backend, quality_score,
    KpiCalculator, KpiSchema, KpiSnapshot, LEGACY_VERSION, LOCAL_VERSION, OFFICIAL_VERSION,
};
pub use pipeline::{
    bucket_all, bucket_municipality, classify_visits, contact_outcome_for_label,
    state_for_label, ContactOutcome, LegacyVisitStatus, PhaseCount, PipelineBuckets,
    PipelineClassification, PipelinePhase, PipelineState, PipelineStateView, PipelineSummary,
    StateCount, TriageEntry, NEEDS_TRIAGE,
};
pub use router::progress_router;
pub use rows::{municipality_names, municipality_rows, MunicipalityRow, RowSource};
pub use service::{ProgressService, ProgressServiceError, ReportRequest};
pub use snapshot::{BackendKpis, DataSnapshot, KpiMetadata};
pub use status::{percent, resolve_status, MunicipalityProgress, MunicipalityStatus};
