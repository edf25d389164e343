use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::checklist::ChecklistRecord;
use super::daily::DailyStatistics;
use super::domain::{AlertFlag, Entity, MunicipalityRecord, Visit};
use crate::ingest::lenient;

/// Everything the last fetch returned. Replaced wholesale on refresh and
/// never mutated by the derived computations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    #[serde(rename = "visitas", default, deserialize_with = "lenient::records")]
    pub visits: Vec<Visit>,
    #[serde(rename = "entidades", default, deserialize_with = "lenient::records")]
    pub entities: Vec<Entity>,
    /// Raw questionnaire rows; entity statuses already carry what the
    /// calculators need.
    #[serde(rename = "questionarios", default, deserialize_with = "lenient::records")]
    pub questionnaires: Vec<Value>,
    #[serde(rename = "municipios", default, deserialize_with = "lenient::records")]
    pub municipalities: Vec<MunicipalityRecord>,
    #[serde(rename = "alertas", default, deserialize_with = "lenient::records")]
    pub alerts: Vec<AlertFlag>,
    #[serde(rename = "estatisticas", default, deserialize_with = "super::daily::backend_statistics")]
    pub statistics: Option<DailyStatistics>,
    #[serde(default, deserialize_with = "backend_kpis")]
    pub kpis: Option<BackendKpis>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    pub kpis_metadata: Option<KpiMetadata>,
    #[serde(default, deserialize_with = "checklists")]
    pub checklists: BTreeMap<String, ChecklistRecord>,
    #[serde(rename = "ultima_atualizacao", default, deserialize_with = "lenient::opt_datetime")]
    pub last_updated: Option<NaiveDateTime>,
}

impl DataSnapshot {
    pub fn entities_for<'a>(&'a self, municipality: &str) -> Vec<&'a Entity> {
        self.entities
            .iter()
            .filter(|entity| entity.belongs_to(municipality))
            .collect()
    }

    pub fn visits_for<'a>(&'a self, municipality: &str) -> Vec<&'a Visit> {
        self.visits
            .iter()
            .filter(|visit| visit.belongs_to(municipality))
            .collect()
    }

    pub fn municipality_record(&self, municipality: &str) -> Option<&MunicipalityRecord> {
        self.municipalities
            .iter()
            .find(|record| crate::ingest::same_municipality(&record.name, municipality))
    }

    /// Schema tag for the backend KPI body; the top-level
    /// `kpis_metadata` block wins over metadata nested in the body.
    pub fn kpi_version(&self) -> Option<&str> {
        self.kpis_metadata
            .as_ref()
            .and_then(|metadata| metadata.versao.as_deref())
            .or_else(|| {
                self.kpis
                    .as_ref()
                    .and_then(|kpis| kpis.metadata.versao.as_deref())
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiMetadata {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub versao: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_datetime")]
    pub calculado_em: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub fonte: Option<String>,
}

/// Pre-aggregated KPI object as sent by the backend, kept untyped until
/// the calculator detects which schema it follows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackendKpis {
    pub metadata: KpiMetadata,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl BackendKpis {
    pub fn from_value(value: Value) -> Option<Self> {
        let mut body = match value {
            Value::Object(map) => map,
            _ => return None,
        };

        if body.contains_key("success") {
            match body.remove("data") {
                Some(Value::Object(inner)) => body = inner,
                _ => return None,
            }
        }

        let metadata = body
            .remove("metadata")
            .and_then(|raw| serde_json::from_value(raw).ok())
            .unwrap_or_default();

        Some(Self { metadata, body })
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

fn backend_kpis<'de, D>(deserializer: D) -> Result<Option<BackendKpis>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(BackendKpis::from_value(value))
}

fn checklists<'de, D>(deserializer: D) -> Result<BTreeMap<String, ChecklistRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(entries) = value else {
        return Ok(BTreeMap::new());
    };

    Ok(entries
        .into_iter()
        .filter_map(|(municipality, raw)| {
            serde_json::from_value::<ChecklistRecord>(raw)
                .ok()
                .map(|record| (municipality, record))
        })
        .collect())
}
