use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::Args;
use pnsb_progress::config::AppConfig;
use pnsb_progress::error::AppError;
use pnsb_progress::ingest::SnapshotImporter;
use pnsb_progress::survey::{PipelineClassification, ProgressDashboard};

use crate::infra::day_start;

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// JSON snapshot exported from the dashboard backend
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Evaluation date (YYYY-MM-DD), defaults to now
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) now: Option<NaiveDate>,
    /// Include one line per municipality
    #[arg(long)]
    pub(crate) list_municipalities: bool,
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        snapshot,
        now,
        list_municipalities,
    } = args;

    let config = AppConfig::load()?;
    let snapshot = SnapshotImporter::from_path(&snapshot)?;
    let now = now
        .map(day_start)
        .unwrap_or_else(|| Utc::now().naive_utc());

    let dashboard = ProgressDashboard::build(&snapshot, &config.alerts, &config.survey, now);
    for line in render_report(&dashboard, list_municipalities) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn render_report(
    dashboard: &ProgressDashboard,
    list_municipalities: bool,
) -> Vec<String> {
    let kpis = &dashboard.kpis;
    let summary = dashboard.summary();
    let mut lines = vec![
        "PNSB survey progress".to_string(),
        format!(
            "Generated {} | KPI source {}",
            dashboard.generated_at.format("%Y-%m-%d %H:%M"),
            kpis.version
        ),
        String::new(),
        "Strategic KPIs".to_string(),
        format!(
            "- Schedule: {} days left, {:.0}% of the window elapsed ({})",
            kpis.days_remaining, kpis.time_progress_pct, kpis.schedule_status
        ),
        format!(
            "- Coverage: {} municipalities done ({:.0}%)",
            kpis.municipalities_completed, kpis.coverage_pct
        ),
        format!(
            "- P1 compliance {:.0}% | MRS {:.0}% | MAP {:.0}%",
            kpis.compliance_p1_pct, kpis.mrs_response_rate, kpis.map_response_rate
        ),
        format!(
            "- Quality {:.0} ({}) | Efficiency {:.0}%",
            kpis.quality_score, kpis.quality_label, kpis.efficiency_pct
        ),
    ];
    if !kpis.insufficient_data.is_empty() {
        lines.push(format!(
            "- Insufficient data: {}",
            kpis.insufficient_data.join(", ")
        ));
    }

    lines.push(String::new());
    lines.push("Municipality status".to_string());
    for status in &summary.statuses {
        lines.push(format!("- {}: {}", status.label, status.count));
    }

    lines.push(String::new());
    lines.push(format!(
        "Pipeline: {} in progress, {} finalized, {} need triage",
        summary.in_progress_pipeline, summary.finalized_pipeline, summary.needs_triage
    ));
    for count in dashboard
        .pipeline_summary
        .states
        .iter()
        .filter(|count| count.count > 0)
    {
        lines.push(format!("- {}: {}", count.name, count.count));
    }

    lines.push(String::new());
    if dashboard.alerts.is_empty() {
        lines.push("Alerts: none".to_string());
    } else {
        lines.push(format!(
            "Alerts ({} critical, {} important, {} info)",
            summary.alerts.critical, summary.alerts.important, summary.alerts.info
        ));
        for alert in &dashboard.alerts {
            lines.push(format!(
                "- [{}] {}: {}",
                alert.severity.label(),
                alert.title,
                alert.description
            ));
        }
    }

    if list_municipalities {
        lines.push(String::new());
        lines.push("Municipalities".to_string());
        for row in &dashboard.municipalities {
            let pipeline = match &row.pipeline {
                PipelineClassification::State { state } => state.name().to_string(),
                PipelineClassification::NeedsTriage { label } => format!("triage ({label})"),
            };
            lines.push(format!(
                "- {}: {} | MRS {}% MAP {}% P1 {}% | {}",
                row.name,
                row.status.label(),
                row.progress_mrs,
                row.progress_map,
                row.progress_p1,
                pipeline
            ));
        }
    }

    lines
}
