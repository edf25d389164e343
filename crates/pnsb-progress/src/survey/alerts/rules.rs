use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::config::AlertConfig;
use super::domain::{Alert, AlertAction, AlertCategory, AlertSeverity, AlertStatus};
use crate::survey::domain::Visit;
use crate::survey::pipeline::{contact_outcome_for_label, ContactOutcome, PipelineState};
use crate::survey::rows::MunicipalityRow;
use crate::survey::status::MunicipalityStatus;

const MIN_CONTACT_SUCCESS_PCT: f64 = 60.0;
const TARGET_MEAN_PROGRESS_PCT: f64 = 50.0;

struct Draft {
    id: String,
    severity: AlertSeverity,
    category: AlertCategory,
    title: &'static str,
    description: String,
    municipality: Option<String>,
    action: AlertAction,
}

impl Draft {
    fn into_alert(self, now: NaiveDateTime) -> Alert {
        Alert {
            id: self.id,
            severity: self.severity,
            priority: self.severity.priority(),
            category: self.category,
            title: self.title.to_string(),
            description: self.description,
            municipality: self.municipality,
            related_municipalities: Vec::new(),
            action: self.action,
            timestamp: now,
            status: AlertStatus::Active,
        }
    }
}

/// Municipalities with no activity for longer than `prazo_agendamento`.
pub(crate) fn stale_no_contact(
    rows: &[MunicipalityRow],
    config: &AlertConfig,
    now: NaiveDateTime,
) -> Vec<Alert> {
    rows.iter()
        .filter(|row| row.status == MunicipalityStatus::NoVisit)
        .filter_map(|row| {
            let idle = row.idle_days(now);
            if idle.is_some_and(|days| days <= i64::from(config.prazo_agendamento)) {
                return None;
            }
            let description = match idle {
                Some(days) => {
                    format!("{} está há {} dias sem agendamento de visita", row.name, days)
                }
                None => format!("{} não tem agendamento nem atividade registrada", row.name),
            };
            Some(
                Draft {
                    id: format!("sem_agendamento_{}", row.name),
                    severity: AlertSeverity::Critical,
                    category: AlertCategory::Prazo,
                    title: "Município sem agendamento",
                    description,
                    municipality: Some(row.name.clone()),
                    action: AlertAction::AgendarVisita,
                }
                .into_alert(now),
            )
        })
        .collect()
}

/// Scheduled or in-preparation visits older than `prazo_execucao`.
pub(crate) fn execution_slippage(
    rows: &[MunicipalityRow],
    config: &AlertConfig,
    now: NaiveDateTime,
) -> Vec<Alert> {
    rows.iter()
        .filter(|row| {
            matches!(
                row.pipeline_state(),
                Some(PipelineState::Agendada | PipelineState::EmPreparacao)
            )
        })
        .filter_map(|row| {
            let days = (now - row.last_visit?).num_days();
            (days > i64::from(config.prazo_execucao)).then(|| {
                Draft {
                    id: format!("atraso_execucao_{}", row.name),
                    severity: AlertSeverity::Important,
                    category: AlertCategory::Atraso,
                    title: "Visita em atraso",
                    description: format!(
                        "{} tem visita agendada há {} dias sem execução",
                        row.name, days
                    ),
                    municipality: Some(row.name.clone()),
                    action: AlertAction::ExecutarVisita,
                }
                .into_alert(now)
            })
        })
        .collect()
}

/// Municipalities whose missing P1 share exceeds `limite_incompletos`.
pub(crate) fn incomplete_data(
    rows: &[MunicipalityRow],
    config: &AlertConfig,
    now: NaiveDateTime,
) -> Vec<Alert> {
    rows.iter()
        .filter_map(|row| {
            let incomplete = 100 - u32::from(row.progress_p1.min(100));
            (incomplete > config.limite_incompletos).then(|| {
                Draft {
                    id: format!("dados_incompletos_{}", row.name),
                    severity: AlertSeverity::Important,
                    category: AlertCategory::Qualidade,
                    title: "Dados incompletos",
                    description: format!("{} tem {}% de dados incompletos", row.name, incomplete),
                    municipality: Some(row.name.clone()),
                    action: AlertAction::CompletarDados,
                }
                .into_alert(now)
            })
        })
        .collect()
}

/// Share of successful contacts among visits with a known outcome.
/// `None` when no visit has an outcome yet.
pub fn contact_success_rate(visits: &[Visit]) -> Option<f64> {
    let (succeeded, failed) = visits
        .iter()
        .filter_map(|visit| contact_outcome_for_label(&visit.status))
        .fold((0usize, 0usize), |(ok, failed), outcome| match outcome {
            ContactOutcome::Succeeded => (ok + 1, failed),
            ContactOutcome::Failed => (ok, failed + 1),
            ContactOutcome::Pending => (ok, failed),
        });

    let decided = succeeded + failed;
    (decided > 0).then(|| (succeeded as f64 / decided as f64 * 100.0).round())
}

pub(crate) fn low_contact_success(
    visits: &[Visit],
    config: &AlertConfig,
    now: NaiveDateTime,
) -> Option<Alert> {
    let rate = contact_success_rate(visits)?;
    if rate >= MIN_CONTACT_SUCCESS_PCT {
        return None;
    }

    let mut failures: BTreeMap<&str, u32> = BTreeMap::new();
    for visit in visits {
        if contact_outcome_for_label(&visit.status) == Some(ContactOutcome::Failed) {
            *failures.entry(visit.municipality_name()).or_default() += 1;
        }
    }

    let mut alert = Draft {
        id: "baixa_taxa_sucesso".to_string(),
        severity: AlertSeverity::Critical,
        category: AlertCategory::Eficiencia,
        title: "Baixa taxa de sucesso de contato",
        description: format!(
            "Taxa geral de sucesso de contato está em {}% (abaixo de 60%)",
            rate
        ),
        municipality: None,
        action: AlertAction::RevisarEstrategia,
    }
    .into_alert(now);

    alert.related_municipalities = failures
        .into_iter()
        .filter(|(name, count)| !name.is_empty() && *count >= config.tentativas_falharam)
        .map(|(name, _)| name.to_string())
        .collect();

    Some(alert)
}

pub(crate) fn slow_progress(rows: &[MunicipalityRow], now: NaiveDateTime) -> Option<Alert> {
    if rows.is_empty() {
        return None;
    }
    let total: f64 = rows.iter().map(|row| f64::from(row.progress_p1)).sum();
    let mean = total / rows.len() as f64;
    if mean >= TARGET_MEAN_PROGRESS_PCT {
        return None;
    }

    Some(
        Draft {
            id: "progresso_lento".to_string(),
            severity: AlertSeverity::Info,
            category: AlertCategory::Meta,
            title: "Progresso abaixo da meta",
            description: format!(
                "Progresso médio dos municípios está em {}% (meta: 50%)",
                mean.round()
            ),
            municipality: None,
            action: AlertAction::AcelerarProgresso,
        }
        .into_alert(now),
    )
}
