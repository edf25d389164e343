use chrono::{Duration, NaiveDateTime, NaiveTime};

use super::{clamp_pct, KpiSchema, KpiSnapshot};
use crate::survey::domain::{Entity, KnownMunicipality, QuestionnaireStatus, SurveyCalendar, Track};
use crate::survey::pipeline::LegacyVisitStatus;
use crate::survey::rows::MunicipalityRow;
use crate::survey::snapshot::DataSnapshot;
use crate::survey::status::MunicipalityStatus;

const SECONDS_PER_DAY: i64 = 86_400;
const RECENT_VISIT_WINDOW_DAYS: i64 = 14;
const RECENT_VISIT_TARGET: f64 = 7.0;

pub(super) fn compute_local(
    snapshot: &DataSnapshot,
    rows: &[MunicipalityRow],
    calendar: &SurveyCalendar,
    now: NaiveDateTime,
) -> KpiSnapshot {
    let mut kpis = KpiSnapshot::empty(KpiSchema::Local);
    let entities = &snapshot.entities;

    kpis.days_remaining = days_remaining(calendar, now);
    kpis.time_progress_pct = time_progress(calendar, now);

    let done = rows
        .iter()
        .filter(|row| row.status == MunicipalityStatus::Done)
        .count();
    kpis.municipalities_completed = done as u32;
    kpis.coverage_pct = rounded_ratio(done, KnownMunicipality::COUNT);

    let p1: Vec<&Entity> = entities.iter().filter(|entity| entity.is_p1()).collect();
    if p1.is_empty() {
        kpis.insufficient_data.push("compliance_p1_pct");
    }
    kpis.compliance_p1_pct = rounded_ratio(
        p1.iter().filter(|entity| entity.fully_validated()).count(),
        p1.len(),
    );

    if entities.is_empty() {
        kpis.insufficient_data.push("quality_score");
    }
    kpis.quality_score = quality_score(entities);

    for track in Track::ordered() {
        let required: Vec<&Entity> = entities
            .iter()
            .filter(|entity| entity.required_for(track))
            .collect();
        let responded = required
            .iter()
            .filter(|entity| {
                matches!(
                    entity.status_for(track),
                    QuestionnaireStatus::Answered | QuestionnaireStatus::ValidatedComplete
                )
            })
            .count();
        let rate = rounded_ratio(responded, required.len());
        match track {
            Track::Mrs => {
                kpis.mrs_response_rate = rate;
                if required.is_empty() {
                    kpis.insufficient_data.push("mrs_response_rate");
                }
            }
            Track::Map => {
                kpis.map_response_rate = rate;
                if required.is_empty() {
                    kpis.insufficient_data.push("map_response_rate");
                }
            }
        }
    }

    if rows.is_empty() {
        kpis.insufficient_data.push("efficiency_pct");
    }
    kpis.efficiency_pct = efficiency_score(rows, snapshot, kpis.quality_score, now);

    kpis.visits_total = snapshot.visits.len() as u32;
    kpis.visits_completed = snapshot
        .visits
        .iter()
        .filter(|visit| LegacyVisitStatus::parse(&visit.status).is_some_and(LegacyVisitStatus::is_completed))
        .count() as u32;

    // Risk needs backend projections.
    kpis.insufficient_data.push("risk_score");

    kpis
}

/// Whole days until the deadline, rounded up and floored at zero.
pub(super) fn days_remaining(calendar: &SurveyCalendar, now: NaiveDateTime) -> u32 {
    let deadline = calendar.deadline.and_time(NaiveTime::MIN);
    let seconds = (deadline - now).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    ((seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY) as u32
}

pub(super) fn time_progress(calendar: &SurveyCalendar, now: NaiveDateTime) -> f64 {
    let start = calendar.start.and_time(NaiveTime::MIN);
    let deadline = calendar.deadline.and_time(NaiveTime::MIN);
    let span = (deadline - start).num_seconds();
    if span <= 0 {
        return if now >= deadline { 100.0 } else { 0.0 };
    }
    let elapsed = (now - start).num_seconds();
    clamp_pct((elapsed as f64 / span as f64 * 100.0).round())
}

/// 30% geocoded, 40% complete contact details, 30% at least one
/// validated questionnaire.
pub fn quality_score(entities: &[Entity]) -> f64 {
    if entities.is_empty() {
        return 0.0;
    }
    let total = entities.len() as f64;
    let share = |predicate: fn(&Entity) -> bool| {
        entities.iter().filter(|entity| predicate(entity)).count() as f64 / total
    };

    let score = share(Entity::is_geocoded) * 30.0
        + share(Entity::has_contact_details) * 40.0
        + share(Entity::any_validated) * 30.0;
    clamp_pct(score.round())
}

/// Weighted operational efficiency over the municipality rows.
pub fn efficiency_score(
    rows: &[MunicipalityRow],
    snapshot: &DataSnapshot,
    quality: f64,
    now: NaiveDateTime,
) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let total = rows.len() as f64;
    let share = |count: usize| count as f64 / total * 100.0;

    let visited = share(
        rows.iter()
            .filter(|row| row.status != MunicipalityStatus::NoVisit)
            .count(),
    );
    let finalized = share(
        rows.iter()
            .filter(|row| row.status == MunicipalityStatus::Done)
            .count(),
    );
    let mean_mrs = rows.iter().map(|row| f64::from(row.progress_mrs)).sum::<f64>() / total;
    let mean_map = rows.iter().map(|row| f64::from(row.progress_map)).sum::<f64>() / total;
    let mean_progress = (mean_mrs + mean_map) / 2.0;
    let on_schedule = share(rows.iter().filter(|row| row.alerts.is_empty()).count());

    let window_start = now - Duration::days(RECENT_VISIT_WINDOW_DAYS);
    let recent = snapshot
        .visits
        .iter()
        .filter(|visit| visit.date.is_some_and(|date| date >= window_start))
        .count();
    let pace = (recent as f64 / RECENT_VISIT_TARGET * 100.0).min(100.0);

    let mut efficiency = visited * 0.20
        + finalized * 0.25
        + mean_progress * 0.20
        + on_schedule * 0.15
        + pace * 0.10
        + quality * 0.10;

    if mean_progress > 80.0 {
        efficiency *= 1.05;
    }
    let flagged = rows.iter().filter(|row| row.has_critical_flag()).count() as f64;
    if flagged > total * 0.3 {
        efficiency *= 0.95;
    }

    clamp_pct(efficiency).round()
}

fn rounded_ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    clamp_pct((part as f64 / total as f64 * 100.0).round())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_datetime;
    use crate::survey::domain::{AlertFlag, Priority, Visit};
    use crate::survey::pipeline::{PipelineClassification, PipelineState};
    use crate::survey::rows::RowSource;

    fn at(raw: &str) -> NaiveDateTime {
        parse_datetime(raw).expect("timestamp")
    }

    fn row(status: MunicipalityStatus, mrs: u8, map: u8) -> MunicipalityRow {
        MunicipalityRow {
            name: "Penha".to_string(),
            latitude: None,
            longitude: None,
            status,
            progress_mrs: mrs,
            progress_map: map,
            progress_p1: 0,
            entity_count: 0,
            p1_total: 0,
            p1_contacted: 0,
            geocoded_pct: 0,
            visit_count: 0,
            last_visit: None,
            last_activity: None,
            pipeline: PipelineClassification::State {
                state: PipelineState::SemVisita,
            },
            alerts: Vec::new(),
            source: RowSource::Entities,
        }
    }

    fn flagged(mut row: MunicipalityRow) -> MunicipalityRow {
        row.alerts.push(AlertFlag {
            severity: Some("critico".to_string()),
            message: "sem resposta".to_string(),
        });
        row
    }

    fn visits_on(dates: &[&str]) -> DataSnapshot {
        DataSnapshot {
            visits: dates
                .iter()
                .map(|date| Visit {
                    municipio: Some("Penha".to_string()),
                    date: parse_datetime(date),
                    status: "realizada".to_string(),
                    ..Visit::default()
                })
                .collect(),
            ..DataSnapshot::default()
        }
    }

    #[test]
    fn efficiency_weights_each_component() {
        let rows = vec![
            row(MunicipalityStatus::Done, 100, 100),
            row(MunicipalityStatus::InProgress, 50, 50),
            flagged(row(MunicipalityStatus::NoVisit, 0, 0)),
            row(MunicipalityStatus::NoVisit, 0, 0),
        ];
        let snapshot = visits_on(&["2025-05-19"; 7]);

        // 50% visited, 25% finalized, 37.5 mean progress, 75% on schedule,
        // full visit pace and quality 60.
        let score = efficiency_score(&rows, &snapshot, 60.0, at("2025-05-20"));
        assert_eq!(score, 51.0);
        assert_eq!(efficiency_score(&[], &snapshot, 60.0, at("2025-05-20")), 0.0);
    }

    #[test]
    fn recent_visits_count_over_fourteen_days_against_seven() {
        let rows = vec![row(MunicipalityStatus::NoVisit, 0, 0)];
        let now = at("2025-05-20");
        let snapshot = DataSnapshot {
            visits: vec![
                Visit::default(),
                visits_on(&["2025-05-05T23:59:59"]).visits[0].clone(),
                visits_on(&["2025-05-06T00:00:00"]).visits[0].clone(),
                visits_on(&["2025-05-19"]).visits[0].clone(),
            ],
            ..DataSnapshot::default()
        };

        // Only on-schedule (15) plus 2 of 7 recent visits.
        assert_eq!(efficiency_score(&rows, &snapshot, 0.0, now), 18.0);
        assert_eq!(efficiency_score(&rows, &visits_on(&["2025-05-19"; 7]), 0.0, now), 25.0);
        assert_eq!(efficiency_score(&rows, &visits_on(&["2025-05-19"; 14]), 0.0, now), 25.0);
    }

    #[test]
    fn high_mean_progress_earns_bonus_only_above_eighty() {
        let now = at("2025-05-20");
        let empty = DataSnapshot::default();

        let at_threshold = vec![row(MunicipalityStatus::Done, 100, 60)];
        assert_eq!(efficiency_score(&at_threshold, &empty, 0.0, now), 76.0);

        let above = vec![row(MunicipalityStatus::Done, 90, 90)];
        assert_eq!(efficiency_score(&above, &empty, 0.0, now), 82.0);
    }

    #[test]
    fn critical_flags_penalize_only_above_thirty_percent() {
        let now = at("2025-05-20");
        let empty = DataSnapshot::default();
        let rows_with = |critical: usize| -> Vec<MunicipalityRow> {
            (0..10)
                .map(|index| {
                    let base = row(MunicipalityStatus::InProgress, 50, 50);
                    if index < critical {
                        flagged(base)
                    } else {
                        base
                    }
                })
                .collect()
        };

        assert_eq!(efficiency_score(&rows_with(3), &empty, 33.0, now), 44.0);
        assert_eq!(efficiency_score(&rows_with(4), &empty, 33.0, now), 40.0);
    }

    #[test]
    fn local_kpis_count_done_rows_and_validated_p1() {
        let p1 = |mrs: QuestionnaireStatus, map: QuestionnaireStatus| Entity {
            municipality: "Penha".to_string(),
            priority: Some(Priority::P1),
            mrs_required: true,
            map_required: true,
            status_mrs: mrs,
            status_map: map,
            ..Entity::default()
        };
        let snapshot = DataSnapshot {
            entities: vec![
                p1(QuestionnaireStatus::ValidatedComplete, QuestionnaireStatus::ValidatedComplete),
                p1(QuestionnaireStatus::ValidatedComplete, QuestionnaireStatus::NotStarted),
                p1(QuestionnaireStatus::NotStarted, QuestionnaireStatus::NotStarted),
                Entity {
                    status_mrs: QuestionnaireStatus::ValidatedComplete,
                    status_map: QuestionnaireStatus::ValidatedComplete,
                    ..Entity::default()
                },
            ],
            ..visits_on(&["2025-05-19"])
        };
        let rows = vec![
            row(MunicipalityStatus::Done, 100, 100),
            row(MunicipalityStatus::Done, 100, 100),
            row(MunicipalityStatus::Done, 100, 100),
            row(MunicipalityStatus::InProgress, 40, 20),
        ];
        let now = at("2025-05-20");

        let kpis = compute_local(&snapshot, &rows, &SurveyCalendar::default(), now);
        assert_eq!(kpis.municipalities_completed, 3);
        assert_eq!(kpis.coverage_pct, 27.0);
        assert_eq!(kpis.compliance_p1_pct, 33.0);
        assert_eq!(
            kpis.efficiency_pct,
            efficiency_score(&rows, &snapshot, kpis.quality_score, now)
        );
        assert_eq!(kpis.visits_total, 1);
        assert!(!kpis.insufficient_data.contains(&"compliance_p1_pct"));
        assert!(kpis.insufficient_data.contains(&"risk_score"));
    }

    #[test]
    fn days_remaining_rounds_up_and_floors_at_zero() {
        let calendar = SurveyCalendar::default();
        assert_eq!(days_remaining(&calendar, at("2025-12-30T12:00:00")), 1);
        assert_eq!(days_remaining(&calendar, at("2025-12-01")), 30);
        assert_eq!(days_remaining(&calendar, at("2026-02-01")), 0);
    }

    #[test]
    fn time_progress_is_clamped() {
        let calendar = SurveyCalendar::default();
        assert_eq!(time_progress(&calendar, at("2024-06-01")), 0.0);
        assert_eq!(time_progress(&calendar, at("2026-06-01")), 100.0);
        assert_eq!(time_progress(&calendar, at("2025-07-02")), 50.0);
    }

    #[test]
    fn quality_score_weights_components() {
        let complete = Entity {
            latitude: Some(-26.9),
            longitude: Some(-48.6),
            name: Some("Prefeitura".to_string()),
            address: Some("Rua A".to_string()),
            phone: Some("4733330000".to_string()),
            status_mrs: QuestionnaireStatus::ValidatedComplete,
            ..Entity::default()
        };
        let bare = Entity::default();
        assert_eq!(quality_score(&[complete.clone()]), 100.0);
        assert_eq!(quality_score(&[complete, bare]), 50.0);
        assert_eq!(quality_score(&[]), 0.0);
    }
}
