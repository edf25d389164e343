use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ingest::lenient;
use crate::ingest::{fold_label, same_municipality};

/// Progress of one questionnaire track for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionnaireStatus {
    #[default]
    NotStarted,
    Answered,
    ValidatedComplete,
    NotApplicable,
}

impl QuestionnaireStatus {
    /// Accepts the backend's Portuguese labels and the English ids.
    /// Anything unrecognized counts as not started.
    pub fn from_label(raw: &str) -> Self {
        match fold_label(raw).replace([' ', '-'], "_").as_str() {
            "respondido" | "answered" => Self::Answered,
            "validado_concluido" | "validado" | "concluido" | "validated_complete" => {
                Self::ValidatedComplete
            }
            "nao_aplicavel" | "not_applicable" => Self::NotApplicable,
            _ => Self::NotStarted,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Não iniciado",
            Self::Answered => "Respondido",
            Self::ValidatedComplete => "Validado/Concluído",
            Self::NotApplicable => "Não aplicável",
        }
    }

    pub const fn is_validated(self) -> bool {
        matches!(self, Self::ValidatedComplete)
    }

    pub const fn is_started(self) -> bool {
        !matches!(self, Self::NotStarted)
    }
}

impl<'de> Deserialize<'de> for QuestionnaireStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(Self::from_label)
            .unwrap_or_default())
    }
}

/// Entity priority tier. P1 responses are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    P1,
    P2,
    P3,
}

impl Priority {
    pub fn from_value(value: &Value) -> Option<Self> {
        let tier = match value {
            Value::Number(number) => number.as_f64()?,
            Value::String(raw) => raw
                .trim()
                .trim_start_matches(['p', 'P'])
                .parse::<f64>()
                .ok()?,
            _ => return None,
        };

        match tier.round() as i64 {
            1 => Some(Self::P1),
            2 => Some(Self::P2),
            3 => Some(Self::P3),
            _ => None,
        }
    }

    pub const fn tier(self) -> u8 {
        match self {
            Self::P1 => 1,
            Self::P2 => 2,
            Self::P3 => 3,
        }
    }
}

fn priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Priority::from_value(&value))
}

/// The two questionnaire tracks every entity may owe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Mrs,
    Map,
}

impl Track {
    pub const fn ordered() -> [Self; 2] {
        [Self::Mrs, Self::Map]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Mrs => "Manejo de Resíduos Sólidos",
            Self::Map => "Manejo de Águas Pluviais",
        }
    }
}

/// A surveyed organization as delivered by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(rename = "municipio", default, deserialize_with = "lenient::string")]
    pub municipality: String,
    #[serde(rename = "prioridade", default, deserialize_with = "priority")]
    pub priority: Option<Priority>,
    #[serde(rename = "mrs_obrigatorio", default, deserialize_with = "lenient::flag")]
    pub mrs_required: bool,
    #[serde(rename = "map_obrigatorio", default, deserialize_with = "lenient::flag")]
    pub map_required: bool,
    #[serde(default)]
    pub status_mrs: QuestionnaireStatus,
    #[serde(default)]
    pub status_map: QuestionnaireStatus,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub longitude: Option<f64>,
    #[serde(rename = "nome", default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(rename = "endereco", default, deserialize_with = "lenient::opt_string")]
    pub address: Option<String>,
    #[serde(rename = "telefone", default, deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
    #[serde(rename = "identificado_em", default, deserialize_with = "lenient::opt_datetime")]
    pub identified_at: Option<NaiveDateTime>,
    #[serde(rename = "atualizado_em", default, deserialize_with = "lenient::opt_datetime")]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(rename = "visita_id", default, deserialize_with = "lenient::opt_string")]
    pub visit_id: Option<String>,
}

impl Entity {
    pub fn is_p1(&self) -> bool {
        self.priority == Some(Priority::P1)
    }

    pub fn status_for(&self, track: Track) -> QuestionnaireStatus {
        match track {
            Track::Mrs => self.status_mrs,
            Track::Map => self.status_map,
        }
    }

    pub fn required_for(&self, track: Track) -> bool {
        match track {
            Track::Mrs => self.mrs_required,
            Track::Map => self.map_required,
        }
    }

    /// Both questionnaires validated.
    pub fn fully_validated(&self) -> bool {
        self.status_mrs.is_validated() && self.status_map.is_validated()
    }

    pub fn any_validated(&self) -> bool {
        self.status_mrs.is_validated() || self.status_map.is_validated()
    }

    pub fn any_started(&self) -> bool {
        self.status_mrs.is_started() || self.status_map.is_started()
    }

    /// Coordinates present and not the zero placeholder.
    pub fn is_geocoded(&self) -> bool {
        matches!(
            (self.latitude, self.longitude),
            (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0
        )
    }

    pub fn has_contact_details(&self) -> bool {
        self.name.is_some() && self.address.is_some() && self.phone.is_some()
    }

    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        self.identified_at.max(self.updated_at)
    }

    pub fn belongs_to(&self, municipality: &str) -> bool {
        same_municipality(&self.municipality, municipality)
    }
}

/// A field visit with its free-text workflow status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub municipio: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub local: Option<String>,
    #[serde(rename = "data", default, deserialize_with = "lenient::opt_datetime")]
    pub date: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: String,
}

impl Visit {
    /// `municipio` wins over the older `local` key.
    pub fn municipality_name(&self) -> &str {
        self.municipio
            .as_deref()
            .or(self.local.as_deref())
            .unwrap_or_default()
    }

    pub fn belongs_to(&self, municipality: &str) -> bool {
        same_municipality(self.municipality_name(), municipality)
    }
}

/// The closed set of municipalities covered by the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownMunicipality {
    BalnearioCamboriu,
    BalnearioPicarras,
    Bombinhas,
    Camboriu,
    Itajai,
    Itapema,
    LuizAlves,
    Navegantes,
    Penha,
    PortoBelo,
    Ilhota,
}

impl KnownMunicipality {
    pub const COUNT: usize = 11;

    pub const fn ordered() -> [Self; 11] {
        [
            Self::BalnearioCamboriu,
            Self::BalnearioPicarras,
            Self::Bombinhas,
            Self::Camboriu,
            Self::Itajai,
            Self::Itapema,
            Self::LuizAlves,
            Self::Navegantes,
            Self::Penha,
            Self::PortoBelo,
            Self::Ilhota,
        ]
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::BalnearioCamboriu => "Balneário Camboriú",
            Self::BalnearioPicarras => "Balneário Piçarras",
            Self::Bombinhas => "Bombinhas",
            Self::Camboriu => "Camboriú",
            Self::Itajai => "Itajaí",
            Self::Itapema => "Itapema",
            Self::LuizAlves => "Luiz Alves",
            Self::Navegantes => "Navegantes",
            Self::Penha => "Penha",
            Self::PortoBelo => "Porto Belo",
            Self::Ilhota => "Ilhota",
        }
    }

    /// `(latitude, longitude)`
    pub const fn coordinates(self) -> (f64, f64) {
        match self {
            Self::BalnearioCamboriu => (-26.975, -48.633),
            Self::BalnearioPicarras => (-26.757, -48.670),
            Self::Bombinhas => (-27.140, -48.482),
            Self::Camboriu => (-27.024, -48.651),
            Self::Itajai => (-26.907, -48.661),
            Self::Itapema => (-27.089, -48.611),
            Self::LuizAlves => (-26.716, -48.934),
            Self::Navegantes => (-26.897, -48.655),
            Self::Penha => (-26.770, -48.651),
            Self::PortoBelo => (-27.158, -48.554),
            Self::Ilhota => (-26.898, -48.828),
        }
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|known| same_municipality(known.name(), raw))
    }
}

/// Questionnaire counts the backend attaches to a municipality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireSummary {
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_mrs_obrigatorios: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_map_obrigatorios: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub mrs_validados: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub map_validados: u32,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub percentual_mrs: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub percentual_map: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub percentual_conclusao: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    #[serde(default, deserialize_with = "lenient::opt_datetime")]
    pub ultima_atividade: Option<NaiveDateTime>,
}

/// Alert marker the backend hangs on a municipality: either a bare
/// message or an object with a severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertFlag {
    pub severity: Option<String>,
    pub message: String,
}

impl AlertFlag {
    /// Flags without a severity are treated as critical.
    pub fn is_critical(&self) -> bool {
        match &self.severity {
            None => true,
            Some(raw) => matches!(
                fold_label(raw).as_str(),
                "critico" | "critica" | "critical" | "alta" | "high"
            ),
        }
    }
}

impl<'de> Deserialize<'de> for AlertFlag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let flag = match &value {
            Value::String(message) => AlertFlag {
                severity: None,
                message: message.trim().to_string(),
            },
            Value::Object(map) => {
                let severity = ["tipo", "severidade", "nivel"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(lenient::string_from));
                let message = ["mensagem", "descricao", "titulo"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(lenient::string_from))
                    .unwrap_or_default();
                AlertFlag { severity, message }
            }
            _ => return Err(serde::de::Error::custom("alert flag must be text or object")),
        };
        Ok(flag)
    }
}

/// Backend-side municipality record with its nested summary blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityRecord {
    #[serde(rename = "municipio", default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
    #[serde(rename = "questionarios", default, deserialize_with = "lenient::opt_record")]
    pub questionnaires: Option<QuestionnaireSummary>,
    #[serde(rename = "resumo", default, deserialize_with = "lenient::opt_record")]
    pub summary: Option<ProgressSummary>,
    #[serde(rename = "total_entidades", default, deserialize_with = "lenient::count")]
    pub total_entities: u32,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    pub timing: Option<TimingSummary>,
    #[serde(rename = "alertas", default, deserialize_with = "lenient::records")]
    pub alerts: Vec<AlertFlag>,
}

/// Survey time window used for schedule metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyCalendar {
    pub start: NaiveDate,
    pub deadline: NaiveDate,
}

impl SurveyCalendar {
    pub fn new(start: NaiveDate, deadline: NaiveDate) -> Self {
        Self { start, deadline }
    }
}

impl Default for SurveyCalendar {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            deadline: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn questionnaire_status_accepts_both_vocabularies() {
        assert_eq!(
            QuestionnaireStatus::from_label("validado_concluido"),
            QuestionnaireStatus::ValidatedComplete
        );
        assert_eq!(
            QuestionnaireStatus::from_label("Não aplicável"),
            QuestionnaireStatus::NotApplicable
        );
        assert_eq!(
            QuestionnaireStatus::from_label("answered"),
            QuestionnaireStatus::Answered
        );
        assert_eq!(
            QuestionnaireStatus::from_label("em revisão"),
            QuestionnaireStatus::NotStarted
        );
    }

    #[test]
    fn entity_decodes_backend_keys_leniently() {
        let entity: Entity = serde_json::from_value(json!({
            "id": 17,
            "municipio": "Itajaí",
            "prioridade": "1",
            "mrs_obrigatorio": true,
            "map_obrigatorio": "false",
            "status_mrs": "respondido",
            "status_map": 5,
            "latitude": "-26.9",
            "longitude": -48.6,
            "nome": "Secretaria de Obras",
            "endereco": "   ",
            "identificado_em": "2025-04-02T09:30:00"
        }))
        .expect("entity decodes");

        assert_eq!(entity.id.as_deref(), Some("17"));
        assert!(entity.is_p1());
        assert!(entity.mrs_required);
        assert!(!entity.map_required);
        assert_eq!(entity.status_mrs, QuestionnaireStatus::Answered);
        assert_eq!(entity.status_map, QuestionnaireStatus::NotStarted);
        assert!(entity.is_geocoded());
        assert!(entity.address.is_none());
        assert!(!entity.has_contact_details());
        assert!(entity.identified_at.is_some());
    }

    #[test]
    fn visit_prefers_municipio_over_local() {
        let visit: Visit = serde_json::from_value(json!({
            "municipio": "Penha",
            "local": "Escola Municipal",
            "status": "agendada"
        }))
        .expect("visit decodes");
        assert_eq!(visit.municipality_name(), "Penha");
        assert!(visit.belongs_to("PENHA"));
    }

    #[test]
    fn known_municipalities_resolve_by_folded_name() {
        assert_eq!(
            KnownMunicipality::from_name("balneario picarras"),
            Some(KnownMunicipality::BalnearioPicarras)
        );
        assert_eq!(KnownMunicipality::from_name("Florianópolis"), None);
        assert_eq!(KnownMunicipality::ordered().len(), KnownMunicipality::COUNT);
    }

    #[test]
    fn alert_flags_accept_text_and_objects() {
        let record: MunicipalityRecord = serde_json::from_value(json!({
            "municipio": "Bombinhas",
            "alertas": ["Sem contato", {"tipo": "info", "mensagem": "Revisar"}, 3],
            "questionarios": "indisponivel"
        }))
        .expect("record decodes");

        assert_eq!(record.alerts.len(), 2);
        assert!(record.alerts[0].is_critical());
        assert!(!record.alerts[1].is_critical());
        assert!(record.questionnaires.is_none());
    }
}
