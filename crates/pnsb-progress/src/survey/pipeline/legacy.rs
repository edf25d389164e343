use serde::Serialize;

use super::taxonomy::PipelineState;
use crate::ingest::fold_label;

/// Free-text visit statuses still emitted by the visit scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyVisitStatus {
    Agendada,
    EmPreparacao,
    Confirmada,
    Aguardando,
    EmAndamento,
    EmExecucao,
    EmFollowUp,
    VerificacaoWhatsapp,
    Realizada,
    QuestionariosConcluidos,
    QuestionariosValidados,
    Finalizada,
    Remarcada,
    NaoRealizada,
    Cancelada,
    Pendente,
}

/// How a visit status counts towards the contact success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    Succeeded,
    Failed,
    Pending,
}

impl LegacyVisitStatus {
    pub const ALL: [Self; 16] = [
        Self::Agendada,
        Self::EmPreparacao,
        Self::Confirmada,
        Self::Aguardando,
        Self::EmAndamento,
        Self::EmExecucao,
        Self::EmFollowUp,
        Self::VerificacaoWhatsapp,
        Self::Realizada,
        Self::QuestionariosConcluidos,
        Self::QuestionariosValidados,
        Self::Finalizada,
        Self::Remarcada,
        Self::NaoRealizada,
        Self::Cancelada,
        Self::Pendente,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Agendada => "agendada",
            Self::EmPreparacao => "em preparação",
            Self::Confirmada => "confirmada",
            Self::Aguardando => "aguardando",
            Self::EmAndamento => "em andamento",
            Self::EmExecucao => "em execução",
            Self::EmFollowUp => "em follow-up",
            Self::VerificacaoWhatsapp => "verificação whatsapp",
            Self::Realizada => "realizada",
            Self::QuestionariosConcluidos => "questionários concluídos",
            Self::QuestionariosValidados => "questionários validados",
            Self::Finalizada => "finalizada",
            Self::Remarcada => "remarcada",
            Self::NaoRealizada => "não realizada",
            Self::Cancelada => "cancelada",
            Self::Pendente => "pendente",
        }
    }

    /// Matches ignoring case, extra whitespace and accents.
    pub fn parse(raw: &str) -> Option<Self> {
        let folded = fold_label(raw);
        Self::ALL
            .into_iter()
            .find(|status| fold_label(status.label()) == folded)
    }

    /// Pipeline state for the labels the lookup table knows about.
    pub const fn pipeline_state(self) -> Option<PipelineState> {
        match self {
            Self::Agendada => Some(PipelineState::Agendada),
            Self::EmPreparacao => Some(PipelineState::EmPreparacao),
            Self::EmAndamento | Self::EmExecucao => Some(PipelineState::EmExecucao),
            Self::EmFollowUp => Some(PipelineState::FollowupNecessario),
            Self::Realizada => Some(PipelineState::Realizada),
            Self::Finalizada => Some(PipelineState::Finalizada),
            _ => None,
        }
    }

    /// The visit itself took place.
    pub const fn is_completed(self) -> bool {
        matches!(
            self,
            Self::Realizada
                | Self::QuestionariosConcluidos
                | Self::QuestionariosValidados
                | Self::Finalizada
        )
    }

    pub const fn contact_outcome(self) -> ContactOutcome {
        match self {
            Self::Remarcada | Self::NaoRealizada | Self::Cancelada => ContactOutcome::Failed,
            Self::Agendada
            | Self::EmPreparacao
            | Self::Aguardando
            | Self::VerificacaoWhatsapp
            | Self::Pendente => ContactOutcome::Pending,
            _ => ContactOutcome::Succeeded,
        }
    }
}

/// Map a raw visit status to a pipeline state. Labels that already are a
/// state id map directly; unknown labels yield `None`.
pub fn state_for_label(raw: &str) -> Option<PipelineState> {
    if let Some(state) = PipelineState::from_id(raw.trim()) {
        return Some(state);
    }
    LegacyVisitStatus::parse(raw).and_then(LegacyVisitStatus::pipeline_state)
}

/// Contact outcome for a raw visit status; `None` when the label is unknown.
pub fn contact_outcome_for_label(raw: &str) -> Option<ContactOutcome> {
    LegacyVisitStatus::parse(raw).map(LegacyVisitStatus::contact_outcome)
}
