//! Daily and weekly field statistics.

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::domain::QuestionnaireStatus;
use super::pipeline::LegacyVisitStatus;
use super::snapshot::DataSnapshot;
use crate::ingest::lenient;

pub const WEEKLY_VISIT_TARGET: u32 = 15;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStatistics {
    #[serde(default, deserialize_with = "lenient::count")]
    pub visitas_agendadas: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub questionarios_pendentes: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub reagendamentos: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekStatistics {
    #[serde(default = "weekly_target", deserialize_with = "lenient::count")]
    pub meta: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub realizado: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub eficiencia: u32,
}

impl Default for WeekStatistics {
    fn default() -> Self {
        Self {
            meta: WEEKLY_VISIT_TARGET,
            realizado: 0,
            eficiencia: 0,
        }
    }
}

fn weekly_target() -> u32 {
    WEEKLY_VISIT_TARGET
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingActions {
    #[serde(default, deserialize_with = "lenient::count")]
    pub contatar: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub validar: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub agendar: u32,
}

/// Field team counters shown on the operations panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStatistics {
    #[serde(default, deserialize_with = "lenient::opt_record")]
    pub hoje: Option<TodayStatistics>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    pub semana: Option<WeekStatistics>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    pub acoes: Option<PendingActions>,
}

/// Backend statistics block; an empty object counts as absent.
pub(crate) fn backend_statistics<'de, D>(deserializer: D) -> Result<Option<DailyStatistics>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Object(map) if !map.is_empty() => Ok(serde_json::from_value(Value::Object(map)).ok()),
        _ => Ok(None),
    }
}

/// Backend statistics pass through untouched; otherwise derive them from
/// the snapshot's visits and entities.
pub fn daily_statistics(snapshot: &DataSnapshot, now: NaiveDateTime) -> DailyStatistics {
    if let Some(statistics) = &snapshot.statistics {
        return statistics.clone();
    }

    let today = now.date();
    let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    let week_end = week_start + Duration::days(7);

    let dated = || snapshot.visits.iter().filter_map(|visit| visit.date.map(|d| (d.date(), visit)));

    let visits_today = dated().filter(|(date, _)| *date == today).count() as u32;
    let rescheduled_today = dated()
        .filter(|(date, visit)| {
            *date == today
                && LegacyVisitStatus::parse(&visit.status) == Some(LegacyVisitStatus::Remarcada)
        })
        .count() as u32;
    let visits_this_week = dated()
        .filter(|(date, _)| *date >= week_start && *date < week_end)
        .count() as u32;

    let p1_pending = snapshot
        .entities
        .iter()
        .filter(|entity| entity.is_p1() && entity.status_mrs == QuestionnaireStatus::NotStarted)
        .count() as u32;
    let to_validate = snapshot
        .entities
        .iter()
        .filter(|entity| {
            entity.status_mrs == QuestionnaireStatus::Answered
                || entity.status_map == QuestionnaireStatus::Answered
        })
        .count() as u32;

    let efficiency = ((f64::from(visits_this_week) / f64::from(WEEKLY_VISIT_TARGET)) * 100.0)
        .round()
        .min(100.0) as u32;

    DailyStatistics {
        hoje: Some(TodayStatistics {
            visitas_agendadas: visits_today,
            questionarios_pendentes: to_validate,
            reagendamentos: rescheduled_today,
        }),
        semana: Some(WeekStatistics {
            meta: WEEKLY_VISIT_TARGET,
            realizado: visits_this_week,
            eficiencia: efficiency,
        }),
        acoes: Some(PendingActions {
            contatar: p1_pending,
            validar: to_validate,
            agendar: p1_pending,
        }),
    }
}
