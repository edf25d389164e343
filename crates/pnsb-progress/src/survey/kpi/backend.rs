use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{clamp_pct, KpiSchema, KpiSnapshot, OFFICIAL_VERSION};
use crate::ingest::lenient;
use crate::survey::snapshot::{BackendKpis, DataSnapshot};

const NESTED_LEGACY_KEYS: [&str; 3] = ["prazo_pnsb", "cobertura_sc", "compliance_p1"];

/// Decide which KPI schema the snapshot carries.
pub fn detect_schema(snapshot: &DataSnapshot) -> KpiSchema {
    let Some(kpis) = snapshot.kpis.as_ref().filter(|kpis| !kpis.is_empty()) else {
        return KpiSchema::Local;
    };

    if snapshot.kpi_version() == Some(OFFICIAL_VERSION) || has_official_structure(&kpis.body) {
        KpiSchema::Official
    } else {
        KpiSchema::Legacy
    }
}

fn has_official_structure(body: &Map<String, Value>) -> bool {
    body.contains_key("cronograma_ibge") && body.contains_key("instrumentos_pesquisa")
}

/// Map a backend KPI body onto the normalized shape. Missing fields take
/// neutral defaults; nothing is recomputed.
pub fn normalize_backend(kpis: &BackendKpis, schema: KpiSchema) -> KpiSnapshot {
    let body = Value::Object(kpis.body.clone());
    match schema {
        KpiSchema::Official => decode::<OfficialKpis>(body).into_snapshot(KpiSchema::Official),
        _ if NESTED_LEGACY_KEYS.iter().any(|key| kpis.body.contains_key(*key)) => {
            decode::<NestedLegacyKpis>(body)
                .into_official()
                .into_snapshot(KpiSchema::Legacy)
        }
        _ => decode::<FlatLegacyKpis>(body).into_snapshot(),
    }
}

fn decode<T: Default + serde::de::DeserializeOwned>(body: Value) -> T {
    serde_json::from_value(body).unwrap_or_default()
}

fn label(value: Option<String>, default: &str) -> String {
    value.unwrap_or_else(|| default.to_string())
}

fn pct(value: Option<f64>) -> f64 {
    clamp_pct(value.unwrap_or(0.0))
}

fn whole(value: Option<f64>) -> u32 {
    value
        .filter(|number| number.is_finite() && *number > 0.0)
        .map(|number| number.round().min(f64::from(u32::MAX)) as u32)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Schedule {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    dias_restantes: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    percentual_tempo_decorrido: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    status_cronograma: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Coverage {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    municipios_concluidos: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    percentual_cobertura: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Compliance {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    percentual_p1_finalizado: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    status_compliance: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Instrument {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    taxa_resposta: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Instruments {
    #[serde(default, deserialize_with = "lenient::opt_record")]
    mrs: Option<Instrument>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    map: Option<Instrument>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DataQuality {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    score_metodologico: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    qualidade_geral: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VisitTotals {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    realizadas: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    total: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Operations {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    eficiencia_pesquisadores: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    visitas: Option<VisitTotals>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RiskLevel {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    nivel: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RiskIndicators {
    #[serde(default, deserialize_with = "lenient::opt_record")]
    risco_cronograma: Option<RiskLevel>,
}

/// Current backend KPI body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OfficialKpis {
    #[serde(default, deserialize_with = "lenient::opt_record")]
    cronograma_ibge: Option<Schedule>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    cobertura_territorial: Option<Coverage>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    compliance_pnsb: Option<Compliance>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    instrumentos_pesquisa: Option<Instruments>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    qualidade_dados: Option<DataQuality>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    efetividade_operacional: Option<Operations>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    indicadores_risco: Option<RiskIndicators>,
}

impl OfficialKpis {
    fn into_snapshot(self, schema: KpiSchema) -> KpiSnapshot {
        let schedule = self.cronograma_ibge.unwrap_or_default();
        let coverage = self.cobertura_territorial.unwrap_or_default();
        let compliance = self.compliance_pnsb.unwrap_or_default();
        let instruments = self.instrumentos_pesquisa.unwrap_or_default();
        let mrs = instruments.mrs.unwrap_or_default();
        let map = instruments.map.unwrap_or_default();
        let quality = self.qualidade_dados.unwrap_or_default();
        let operations = self.efetividade_operacional.unwrap_or_default();
        let visits = operations.visitas.unwrap_or_default();
        let risk = self
            .indicadores_risco
            .and_then(|indicators| indicators.risco_cronograma)
            .unwrap_or_default();

        let defaults = KpiSnapshot::empty(schema);
        KpiSnapshot {
            days_remaining: whole(schedule.dias_restantes),
            time_progress_pct: pct(schedule.percentual_tempo_decorrido),
            schedule_status: label(schedule.status_cronograma, &defaults.schedule_status),
            municipalities_completed: whole(coverage.municipios_concluidos),
            coverage_pct: pct(coverage.percentual_cobertura),
            compliance_p1_pct: pct(compliance.percentual_p1_finalizado),
            compliance_status: label(compliance.status_compliance, &defaults.compliance_status),
            mrs_response_rate: pct(mrs.taxa_resposta),
            mrs_status: label(mrs.status, &defaults.mrs_status),
            map_response_rate: pct(map.taxa_resposta),
            map_status: label(map.status, &defaults.map_status),
            quality_score: pct(quality.score_metodologico),
            quality_label: label(quality.qualidade_geral, &defaults.quality_label),
            efficiency_pct: pct(operations.eficiencia_pesquisadores),
            visits_completed: whole(visits.realizadas),
            visits_total: whole(visits.total),
            risk_level: label(risk.nivel, &defaults.risk_level),
            risk_score: pct(risk.score),
            ..defaults
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LegacyDeadline {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    dias_restantes: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    progresso_tempo: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LegacyCoverage {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    municipios_concluidos: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    percentual: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LegacyPercent {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    percentual: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LegacyQuality {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    categoria: Option<String>,
}

/// Older nested body, converted to the current blocks before mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NestedLegacyKpis {
    #[serde(default, deserialize_with = "lenient::opt_record")]
    prazo_pnsb: Option<LegacyDeadline>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    cobertura_sc: Option<LegacyCoverage>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    compliance_p1: Option<LegacyPercent>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    qualidade: Option<LegacyQuality>,
}

impl NestedLegacyKpis {
    fn into_official(self) -> OfficialKpis {
        let deadline = self.prazo_pnsb.unwrap_or_default();
        let coverage = self.cobertura_sc.unwrap_or_default();
        let quality = self.qualidade.unwrap_or_default();

        OfficialKpis {
            cronograma_ibge: Some(Schedule {
                dias_restantes: deadline.dias_restantes,
                percentual_tempo_decorrido: deadline.progresso_tempo,
                status_cronograma: None,
            }),
            cobertura_territorial: Some(Coverage {
                municipios_concluidos: coverage.municipios_concluidos,
                percentual_cobertura: coverage.percentual,
            }),
            compliance_pnsb: Some(Compliance {
                percentual_p1_finalizado: self.compliance_p1.and_then(|c| c.percentual),
                status_compliance: None,
            }),
            qualidade_dados: Some(DataQuality {
                score_metodologico: quality.score,
                qualidade_geral: quality.categoria,
            }),
            ..OfficialKpis::default()
        }
    }
}

/// Flat camelCase body from the first backend version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FlatLegacyKpis {
    #[serde(rename = "diasRestantes", default, deserialize_with = "lenient::opt_number")]
    days_remaining: Option<f64>,
    #[serde(rename = "municipiosConcluidos", default, deserialize_with = "lenient::opt_number")]
    municipalities_completed: Option<f64>,
    #[serde(rename = "coberturaMunicipios", default, deserialize_with = "lenient::opt_number")]
    coverage: Option<f64>,
    #[serde(rename = "complianceP1", default, deserialize_with = "lenient::opt_number")]
    compliance_p1: Option<f64>,
    #[serde(rename = "scoreQualidade", default, deserialize_with = "lenient::opt_number")]
    quality_score: Option<f64>,
    #[serde(rename = "progressoTempo", default, deserialize_with = "lenient::opt_number")]
    time_progress: Option<f64>,
    #[serde(rename = "eficienciaPesquisadores", default, deserialize_with = "lenient::opt_number")]
    efficiency: Option<f64>,
    #[serde(rename = "taxaRespostaMRS", default, deserialize_with = "lenient::opt_number")]
    mrs_response_rate: Option<f64>,
    #[serde(rename = "taxaRespostaMAP", default, deserialize_with = "lenient::opt_number")]
    map_response_rate: Option<f64>,
    #[serde(rename = "statusCronograma", default, deserialize_with = "lenient::opt_string")]
    schedule_status: Option<String>,
    #[serde(rename = "statusCompliance", default, deserialize_with = "lenient::opt_string")]
    compliance_status: Option<String>,
    #[serde(rename = "qualidadeGeral", default, deserialize_with = "lenient::opt_string")]
    quality_label: Option<String>,
    #[serde(rename = "nivelRisco", default, deserialize_with = "lenient::opt_string")]
    risk_level: Option<String>,
    #[serde(rename = "scoreRisco", default, deserialize_with = "lenient::opt_number")]
    risk_score: Option<f64>,
}

impl FlatLegacyKpis {
    fn into_snapshot(self) -> KpiSnapshot {
        let defaults = KpiSnapshot::empty(KpiSchema::Legacy);
        KpiSnapshot {
            days_remaining: whole(self.days_remaining),
            time_progress_pct: pct(self.time_progress),
            schedule_status: label(self.schedule_status, &defaults.schedule_status),
            municipalities_completed: whole(self.municipalities_completed),
            coverage_pct: pct(self.coverage),
            compliance_p1_pct: pct(self.compliance_p1),
            compliance_status: label(self.compliance_status, &defaults.compliance_status),
            mrs_response_rate: pct(self.mrs_response_rate),
            map_response_rate: pct(self.map_response_rate),
            quality_score: pct(self.quality_score),
            quality_label: label(self.quality_label, &defaults.quality_label),
            efficiency_pct: pct(self.efficiency),
            risk_level: label(self.risk_level, &defaults.risk_level),
            risk_score: pct(self.risk_score),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SnapshotImporter;

    fn snapshot(payload: &str) -> DataSnapshot {
        SnapshotImporter::from_json_str(payload).expect("snapshot")
    }

    #[test]
    fn detects_schema_from_tag_structure_and_absence() {
        assert_eq!(detect_schema(&DataSnapshot::default()), KpiSchema::Local);
        assert_eq!(detect_schema(&snapshot(r#"{"kpis": {}}"#)), KpiSchema::Local);
        assert_eq!(
            detect_schema(&snapshot(
                r#"{"kpis": {"metadata": {"versao": "2.0_pnsb_oficial"}, "cronograma_ibge": {}}}"#
            )),
            KpiSchema::Official
        );
        assert_eq!(
            detect_schema(&snapshot(
                r#"{"kpis": {"cronograma_ibge": {}, "instrumentos_pesquisa": {}}}"#
            )),
            KpiSchema::Official
        );
        assert_eq!(
            detect_schema(&snapshot(r#"{"kpis": {"diasRestantes": 10}}"#)),
            KpiSchema::Legacy
        );
    }

    #[test]
    fn official_fields_pass_through() {
        let snapshot = snapshot(
            r#"{"kpis": {
                "metadata": {"versao": "2.0_pnsb_oficial"},
                "cronograma_ibge": {"dias_restantes": 120, "percentual_tempo_decorrido": 67.5, "status_cronograma": "atencao"},
                "instrumentos_pesquisa": {"mrs": {"taxa_resposta": 45.2, "status": "regular"}, "map": {"taxa_resposta": "38"}},
                "indicadores_risco": {"risco_cronograma": {"nivel": "medio", "score": 140}}
            }}"#,
        );
        let kpis = snapshot.kpis.as_ref().expect("kpis");
        let normalized = normalize_backend(kpis, detect_schema(&snapshot));

        assert_eq!(normalized.version, OFFICIAL_VERSION);
        assert_eq!(normalized.days_remaining, 120);
        assert_eq!(normalized.time_progress_pct, 67.5);
        assert_eq!(normalized.schedule_status, "atencao");
        assert_eq!(normalized.mrs_response_rate, 45.2);
        assert_eq!(normalized.map_response_rate, 38.0);
        assert_eq!(normalized.map_status, "indefinido");
        assert_eq!(normalized.quality_label, "indefinida");
        assert_eq!(normalized.risk_level, "medio");
        assert_eq!(normalized.risk_score, 100.0);
    }

    #[test]
    fn nested_legacy_body_is_converted() {
        let snapshot = snapshot(
            r#"{"kpis": {
                "prazo_pnsb": {"dias_restantes": 30, "progresso_tempo": 90},
                "cobertura_sc": {"municipios_concluidos": 4, "percentual": 36.4},
                "qualidade": {"score": 71, "categoria": "boa"}
            }}"#,
        );
        let kpis = snapshot.kpis.as_ref().expect("kpis");
        let normalized = normalize_backend(kpis, detect_schema(&snapshot));

        assert_eq!(normalized.schema, KpiSchema::Legacy);
        assert_eq!(normalized.days_remaining, 30);
        assert_eq!(normalized.municipalities_completed, 4);
        assert_eq!(normalized.coverage_pct, 36.4);
        assert_eq!(normalized.compliance_p1_pct, 0.0);
        assert_eq!(normalized.quality_label, "boa");
        assert_eq!(normalized.risk_level, "baixo");
    }

    #[test]
    fn malformed_official_blocks_default() {
        let snapshot = snapshot(
            r#"{"kpis": {"cronograma_ibge": "quebrado", "instrumentos_pesquisa": {"mrs": 3}}}"#,
        );
        let kpis = snapshot.kpis.as_ref().expect("kpis");
        let normalized = normalize_backend(kpis, KpiSchema::Official);
        assert_eq!(normalized.days_remaining, 0);
        assert_eq!(normalized.mrs_status, "indefinido");
    }
}
