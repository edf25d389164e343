//! One derived row per municipality, shared by the KPI, alert and
//! dashboard computations.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::domain::{AlertFlag, Entity, KnownMunicipality, MunicipalityRecord, Visit};
use super::pipeline::{classify_visits, PipelineClassification, PipelineState};
use super::snapshot::DataSnapshot;
use super::status::{percent, resolve_status, MunicipalityProgress, MunicipalityStatus};
use crate::ingest::fold_label;

/// Where the progress figures of a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSource {
    Entities,
    BackendSummary,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalityRow {
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: MunicipalityStatus,
    pub progress_mrs: u8,
    pub progress_map: u8,
    pub progress_p1: u8,
    pub entity_count: usize,
    pub p1_total: usize,
    /// P1 entities whose MRS questionnaire has at least been answered.
    pub p1_contacted: usize,
    pub geocoded_pct: u8,
    pub visit_count: usize,
    pub last_visit: Option<NaiveDateTime>,
    pub last_activity: Option<NaiveDateTime>,
    pub pipeline: PipelineClassification,
    pub alerts: Vec<AlertFlag>,
    pub source: RowSource,
}

impl MunicipalityRow {
    pub fn pipeline_state(&self) -> Option<PipelineState> {
        self.pipeline.state()
    }

    pub fn has_critical_flag(&self) -> bool {
        self.alerts.iter().any(AlertFlag::is_critical)
    }

    pub fn idle_days(&self, now: NaiveDateTime) -> Option<i64> {
        self.last_activity
            .map(|at| (now - at).num_days().max(0))
    }
}

/// Municipality names the dashboard covers: the backend list when it has
/// one, the fixed survey set otherwise.
pub fn municipality_names(snapshot: &DataSnapshot) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in &snapshot.municipalities {
        let name = record.name.trim();
        if name.is_empty() || names.iter().any(|seen| fold_label(seen) == fold_label(name)) {
            continue;
        }
        names.push(name.to_string());
    }

    if names.is_empty() {
        names = KnownMunicipality::ordered()
            .iter()
            .map(|known| known.name().to_string())
            .collect();
    }
    names
}

pub fn municipality_rows(snapshot: &DataSnapshot) -> Vec<MunicipalityRow> {
    municipality_names(snapshot)
        .into_iter()
        .map(|name| {
            let entities = snapshot.entities_for(&name);
            let visits = snapshot.visits_for(&name);
            let record = snapshot.municipality_record(&name);
            build_row(name, &entities, &visits, record)
        })
        .collect()
}

fn build_row(
    name: String,
    entities: &[&Entity],
    visits: &[&Visit],
    record: Option<&MunicipalityRecord>,
) -> MunicipalityRow {
    let (progress, source) = if !entities.is_empty() {
        (resolve_status(entities, visits), RowSource::Entities)
    } else if let Some(progress) = record.and_then(|record| backend_progress(record, visits)) {
        (progress, RowSource::BackendSummary)
    } else {
        (resolve_status(entities, visits), RowSource::NoData)
    };

    let p1: Vec<&&Entity> = entities.iter().filter(|entity| entity.is_p1()).collect();
    let geocoded = entities.iter().filter(|entity| entity.is_geocoded()).count();
    let coordinates = KnownMunicipality::from_name(&name).map(KnownMunicipality::coordinates);

    let last_activity = entities
        .iter()
        .filter_map(|entity| entity.latest_timestamp())
        .chain(progress.last_visit)
        .chain(
            record
                .and_then(|record| record.timing.as_ref())
                .and_then(|timing| timing.ultima_atividade),
        )
        .max();

    MunicipalityRow {
        latitude: coordinates.map(|(lat, _)| lat),
        longitude: coordinates.map(|(_, lng)| lng),
        status: progress.status,
        progress_mrs: progress.progress_mrs,
        progress_map: progress.progress_map,
        progress_p1: progress.progress_p1,
        entity_count: entities.len(),
        p1_total: p1.len(),
        p1_contacted: p1.iter().filter(|entity| entity.status_mrs.is_started()).count(),
        geocoded_pct: percent(geocoded, entities.len()),
        visit_count: visits.len(),
        last_visit: progress.last_visit,
        last_activity,
        pipeline: classify_visits(visits),
        alerts: record.map(|record| record.alerts.clone()).unwrap_or_default(),
        source,
        name,
    }
}

/// Progress from the backend's nested summary blocks, used when the
/// snapshot has no entity rows for the municipality.
fn backend_progress(record: &MunicipalityRecord, visits: &[&Visit]) -> Option<MunicipalityProgress> {
    if record.questionnaires.is_none() && record.summary.is_none() && record.status.is_none() {
        return None;
    }

    let (progress_mrs, progress_map) = match &record.questionnaires {
        Some(summary) => (
            summary
                .percentual_mrs
                .map(clamp_pct)
                .unwrap_or_else(|| ratio(summary.mrs_validados, summary.total_mrs_obrigatorios)),
            summary
                .percentual_map
                .map(clamp_pct)
                .unwrap_or_else(|| ratio(summary.map_validados, summary.total_map_obrigatorios)),
        ),
        None => (0, 0),
    };

    let progress_p1 = record
        .summary
        .as_ref()
        .and_then(|summary| summary.percentual_conclusao)
        .map(clamp_pct)
        .unwrap_or(0);

    let status = record
        .status
        .as_deref()
        .and_then(status_from_label)
        .unwrap_or(if progress_p1 >= 100 {
            MunicipalityStatus::Done
        } else if progress_p1 > 0 || progress_mrs > 0 || progress_map > 0 {
            MunicipalityStatus::InProgress
        } else {
            MunicipalityStatus::NoVisit
        });

    Some(MunicipalityProgress {
        status,
        progress_mrs,
        progress_map,
        progress_p1,
        last_visit: visits.iter().filter_map(|visit| visit.date).max(),
    })
}

fn status_from_label(raw: &str) -> Option<MunicipalityStatus> {
    match fold_label(raw).replace([' ', '_'], "-").as_str() {
        "no-visit" | "sem-visita" => Some(MunicipalityStatus::NoVisit),
        "in-progress" | "em-andamento" | "em-execucao" => Some(MunicipalityStatus::InProgress),
        "done" | "concluido" | "finalizado" => Some(MunicipalityStatus::Done),
        _ => None,
    }
}

fn clamp_pct(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn ratio(part: u32, total: u32) -> u8 {
    percent(part as usize, total as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{parse_datetime, SnapshotImporter};

    #[test]
    fn empty_snapshot_covers_known_municipalities() {
        let rows = municipality_rows(&DataSnapshot::default());
        assert_eq!(rows.len(), KnownMunicipality::COUNT);
        assert!(rows.iter().all(|row| row.status == MunicipalityStatus::NoVisit));
        assert!(rows.iter().all(|row| row.source == RowSource::NoData));
        assert!(rows.iter().all(|row| row.latitude.is_some()));
    }

    #[test]
    fn rows_combine_entities_visits_and_backend_blocks() {
        let snapshot = SnapshotImporter::from_json_str(
            r#"{
                "municipios": [
                    {"municipio": "Penha", "timing": {"ultima_atividade": "2025-05-20"},
                     "alertas": ["Sem retorno"]},
                    {"municipio": "Itajaí", "status": "em_andamento",
                     "questionarios": {"total_mrs_obrigatorios": 4, "mrs_validados": 1, "percentual_map": 62.4},
                     "resumo": {"percentual_conclusao": 40}},
                    {"municipio": "penha"}
                ],
                "entidades": [
                    {"municipio": "Penha", "prioridade": 1, "mrs_obrigatorio": true,
                     "status_mrs": "respondido", "latitude": -26.7, "longitude": -48.6,
                     "identificado_em": "2025-05-01"},
                    {"municipio": "Penha", "prioridade": 3}
                ],
                "visitas": [{"municipio": "Penha", "data": "2025-05-10", "status": "agendada"}]
            }"#,
        )
        .expect("snapshot");

        let rows = municipality_rows(&snapshot);
        assert_eq!(rows.len(), 2);

        let penha = &rows[0];
        assert_eq!(penha.source, RowSource::Entities);
        assert_eq!(penha.status, MunicipalityStatus::InProgress);
        assert_eq!(penha.p1_total, 1);
        assert_eq!(penha.p1_contacted, 1);
        assert_eq!(penha.geocoded_pct, 50);
        assert_eq!(penha.pipeline_state(), Some(PipelineState::Agendada));
        assert_eq!(penha.last_activity, parse_datetime("2025-05-20"));
        assert!(penha.has_critical_flag());

        let itajai = &rows[1];
        assert_eq!(itajai.source, RowSource::BackendSummary);
        assert_eq!(itajai.status, MunicipalityStatus::InProgress);
        assert_eq!(itajai.progress_mrs, 25);
        assert_eq!(itajai.progress_map, 62);
        assert_eq!(itajai.progress_p1, 40);
        assert_eq!(itajai.pipeline_state(), Some(PipelineState::SemVisita));
    }
}
