use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    #[serde(rename = "critico", alias = "critical")]
    Critical,
    #[serde(rename = "importante", alias = "important")]
    Important,
    #[serde(rename = "info")]
    Info,
}

impl AlertSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Critical => "Crítico",
            Self::Important => "Importante",
            Self::Info => "Informativo",
        }
    }

    pub const fn priority(self) -> AlertPriority {
        match self {
            Self::Critical => AlertPriority::High,
            Self::Important => AlertPriority::Medium,
            Self::Info => AlertPriority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertPriority {
    #[serde(rename = "alta")]
    High,
    #[serde(rename = "media")]
    Medium,
    #[serde(rename = "baixa")]
    Low,
}

impl AlertPriority {
    pub const fn rank(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

/// Recommended follow-up attached to every alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertAction {
    AgendarVisita,
    ExecutarVisita,
    CompletarDados,
    RevisarEstrategia,
    AcelerarProgresso,
}

impl AlertAction {
    pub const fn tag(self) -> &'static str {
        match self {
            Self::AgendarVisita => "agendar_visita",
            Self::ExecutarVisita => "executar_visita",
            Self::CompletarDados => "completar_dados",
            Self::RevisarEstrategia => "revisar_estrategia",
            Self::AcelerarProgresso => "acelerar_progresso",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Prazo,
    Atraso,
    Qualidade,
    Eficiencia,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertStatus {
    #[serde(rename = "ativo", alias = "active")]
    Active,
    #[serde(rename = "resolvido", alias = "resolved")]
    Resolved,
    #[serde(rename = "ignorado", alias = "ignored")]
    Ignored,
}

impl AlertStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "ativo",
            Self::Resolved => "resolvido",
            Self::Ignored => "ignorado",
        }
    }

    pub const fn is_closed(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Alert candidate produced by the rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: AlertSeverity,
    pub priority: AlertPriority,
    pub category: AlertCategory,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    /// Municipalities a global alert points at.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_municipalities: Vec<String>,
    pub action: AlertAction,
    pub timestamp: NaiveDateTime,
    pub status: AlertStatus,
}
