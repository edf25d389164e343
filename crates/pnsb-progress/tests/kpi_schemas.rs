use chrono::NaiveDateTime;
use pnsb_progress::ingest::{parse_datetime, SnapshotImporter};
use pnsb_progress::survey::{
    compute_kpis, detect_schema, DataSnapshot, KpiSchema, SurveyCalendar, LEGACY_VERSION,
    OFFICIAL_VERSION,
};

fn now() -> NaiveDateTime {
    parse_datetime("2025-06-01").expect("timestamp")
}

fn snapshot(payload: &str) -> DataSnapshot {
    SnapshotImporter::from_json_str(payload).expect("snapshot decodes")
}

const OFFICIAL: &str = r#"{
    "kpis": {
        "success": true,
        "data": {
            "metadata": {"versao": "2.0_pnsb_oficial", "fonte": "backend"},
            "cronograma_ibge": {"dias_restantes": 45, "percentual_tempo_decorrido": 62.5,
                                "status_cronograma": "atencao"},
            "cobertura_territorial": {"municipios_concluidos": 4, "percentual_cobertura": 36.4},
            "compliance_pnsb": {"percentual_p1_finalizado": 58.0, "status_compliance": "em_risco"},
            "instrumentos_pesquisa": {
                "mrs": {"taxa_resposta": 71.0, "status": "adequado"},
                "map": {"taxa_resposta": 48.0}
            },
            "qualidade_dados": {"score_metodologico": 83.0, "qualidade_geral": "boa"},
            "efetividade_operacional": {"eficiencia_pesquisadores": 77.0,
                                        "visitas": {"realizadas": 21, "total": 30}},
            "indicadores_risco": {"risco_cronograma": {"nivel": "medio", "score": 40}}
        }
    }
}"#;

#[test]
fn official_payload_passes_through_unchanged() {
    let snapshot = snapshot(OFFICIAL);
    assert_eq!(detect_schema(&snapshot), KpiSchema::Official);

    let kpis = compute_kpis(&snapshot, &SurveyCalendar::default(), now());
    assert_eq!(kpis.version, OFFICIAL_VERSION);
    assert_eq!(kpis.days_remaining, 45);
    assert_eq!(kpis.time_progress_pct, 62.5);
    assert_eq!(kpis.schedule_status, "atencao");
    assert_eq!(kpis.municipalities_completed, 4);
    assert_eq!(kpis.coverage_pct, 36.4);
    assert_eq!(kpis.compliance_p1_pct, 58.0);
    assert_eq!(kpis.compliance_status, "em_risco");
    assert_eq!(kpis.mrs_response_rate, 71.0);
    assert_eq!(kpis.map_response_rate, 48.0);
    assert_eq!(kpis.map_status, "indefinido");
    assert_eq!(kpis.quality_score, 83.0);
    assert_eq!(kpis.quality_label, "boa");
    assert_eq!(kpis.efficiency_pct, 77.0);
    assert_eq!((kpis.visits_completed, kpis.visits_total), (21, 30));
    assert_eq!(kpis.risk_level, "medio");
    assert_eq!(kpis.risk_score, 40.0);
    assert!(kpis.insufficient_data.is_empty());
}

#[test]
fn untagged_legacy_payload_normalizes_to_equivalent_values() {
    let official = compute_kpis(&snapshot(OFFICIAL), &SurveyCalendar::default(), now());

    let legacy_snapshot = snapshot(
        r#"{
            "kpis": {
                "diasRestantes": 45, "progressoTempo": "62,5", "statusCronograma": "atencao",
                "municipiosConcluidos": 4, "coberturaMunicipios": 36.4,
                "complianceP1": 58, "statusCompliance": "em_risco",
                "taxaRespostaMRS": 71, "taxaRespostaMAP": 48,
                "scoreQualidade": 83, "qualidadeGeral": "boa",
                "eficienciaPesquisadores": 77,
                "nivelRisco": "medio", "scoreRisco": 40
            }
        }"#,
    );
    assert_eq!(detect_schema(&legacy_snapshot), KpiSchema::Legacy);

    let legacy = compute_kpis(&legacy_snapshot, &SurveyCalendar::default(), now());
    assert_eq!(legacy.schema, KpiSchema::Legacy);
    assert_eq!(legacy.version, LEGACY_VERSION);
    assert_eq!(legacy.days_remaining, official.days_remaining);
    assert_eq!(legacy.time_progress_pct, official.time_progress_pct);
    assert_eq!(legacy.schedule_status, official.schedule_status);
    assert_eq!(legacy.municipalities_completed, official.municipalities_completed);
    assert_eq!(legacy.coverage_pct, official.coverage_pct);
    assert_eq!(legacy.compliance_p1_pct, official.compliance_p1_pct);
    assert_eq!(legacy.compliance_status, official.compliance_status);
    assert_eq!(legacy.mrs_response_rate, official.mrs_response_rate);
    assert_eq!(legacy.map_response_rate, official.map_response_rate);
    assert_eq!(legacy.quality_score, official.quality_score);
    assert_eq!(legacy.quality_label, official.quality_label);
    assert_eq!(legacy.efficiency_pct, official.efficiency_pct);
    assert_eq!(legacy.risk_level, official.risk_level);
    assert_eq!(legacy.risk_score, official.risk_score);
}

#[test]
fn nested_legacy_payload_is_converted() {
    let snapshot = snapshot(
        r#"{
            "kpis": {
                "prazo_pnsb": {"dias_restantes": 30, "progresso_tempo": 80},
                "cobertura_sc": {"municipios_concluidos": 2, "percentual": 18.2},
                "compliance_p1": {"percentual": 25},
                "qualidade": {"score": 64, "categoria": "regular"}
            }
        }"#,
    );
    let kpis = compute_kpis(&snapshot, &SurveyCalendar::default(), now());
    assert_eq!(kpis.schema, KpiSchema::Legacy);
    assert_eq!(kpis.days_remaining, 30);
    assert_eq!(kpis.coverage_pct, 18.2);
    assert_eq!(kpis.compliance_p1_pct, 25.0);
    assert_eq!(kpis.quality_label, "regular");
    assert_eq!(kpis.risk_level, "baixo");
}

#[test]
fn missing_kpis_fall_back_to_local_computation() {
    for payload in [r#"{}"#, r#"{"kpis": {}}"#, r#"{"kpis": {"success": true, "data": {}}}"#] {
        let snapshot = snapshot(payload);
        assert_eq!(detect_schema(&snapshot), KpiSchema::Local);
        let kpis = compute_kpis(&snapshot, &SurveyCalendar::default(), now());
        assert_eq!(kpis.version, "local");
        assert!(kpis.insufficient_data.contains(&"risk_score"));
    }
}
