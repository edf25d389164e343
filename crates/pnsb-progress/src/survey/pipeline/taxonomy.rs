use serde::{Deserialize, Serialize};

/// The five ordered workflow phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Planejamento,
    PreVisita,
    Execucao,
    PosVisita,
    Finalizacao,
}

impl PipelinePhase {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Planejamento,
            Self::PreVisita,
            Self::Execucao,
            Self::PosVisita,
            Self::Finalizacao,
        ]
    }

    pub const fn id(self) -> &'static str {
        match self {
            Self::Planejamento => "planejamento",
            Self::PreVisita => "pre_visita",
            Self::Execucao => "execucao",
            Self::PosVisita => "pos_visita",
            Self::Finalizacao => "finalizacao",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Planejamento => "Planejamento",
            Self::PreVisita => "Pré-Visita",
            Self::Execucao => "Execução",
            Self::PosVisita => "Pós-Visita",
            Self::Finalizacao => "Finalização",
        }
    }

    pub fn states(self) -> impl Iterator<Item = PipelineState> {
        PipelineState::ALL
            .into_iter()
            .filter(move |state| state.phase() == self)
    }
}

/// Fixed 25-state workflow taxonomy. Serialized as the state id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    SemVisita,
    IdentificacaoPendente,
    ContatosPendentes,
    AgendamentoPendente,
    Agendada,
    ConfirmacaoPendente,
    EmPreparacao,
    RotaPlanejada,
    EquipeDesignada,
    PreVisitaCompleta,
    EmDeslocamento,
    EmExecucao,
    ColetandoMrs,
    ColetandoMap,
    ValidandoDados,
    DadosColetados,
    ProcessandoDados,
    ValidacaoTecnica,
    PendenciasIdentificadas,
    FollowupNecessario,
    DadosValidados,
    RelatorioPreliminar,
    AprovacaoFinal,
    Realizada,
    Finalizada,
}

impl PipelineState {
    pub const ALL: [Self; 25] = [
        Self::SemVisita,
        Self::IdentificacaoPendente,
        Self::ContatosPendentes,
        Self::AgendamentoPendente,
        Self::Agendada,
        Self::ConfirmacaoPendente,
        Self::EmPreparacao,
        Self::RotaPlanejada,
        Self::EquipeDesignada,
        Self::PreVisitaCompleta,
        Self::EmDeslocamento,
        Self::EmExecucao,
        Self::ColetandoMrs,
        Self::ColetandoMap,
        Self::ValidandoDados,
        Self::DadosColetados,
        Self::ProcessandoDados,
        Self::ValidacaoTecnica,
        Self::PendenciasIdentificadas,
        Self::FollowupNecessario,
        Self::DadosValidados,
        Self::RelatorioPreliminar,
        Self::AprovacaoFinal,
        Self::Realizada,
        Self::Finalizada,
    ];

    /// States counted as "in progress" on the dashboard summary.
    pub const IN_FLIGHT: [Self; 10] = [
        Self::ConfirmacaoPendente,
        Self::EmPreparacao,
        Self::RotaPlanejada,
        Self::EquipeDesignada,
        Self::EmDeslocamento,
        Self::EmExecucao,
        Self::ColetandoMrs,
        Self::ColetandoMap,
        Self::DadosColetados,
        Self::ProcessandoDados,
    ];

    pub fn from_id(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.id() == raw)
    }

    pub const fn id(self) -> &'static str {
        match self {
            Self::SemVisita => "sem_visita",
            Self::IdentificacaoPendente => "identificacao_pendente",
            Self::ContatosPendentes => "contatos_pendentes",
            Self::AgendamentoPendente => "agendamento_pendente",
            Self::Agendada => "agendada",
            Self::ConfirmacaoPendente => "confirmacao_pendente",
            Self::EmPreparacao => "em_preparacao",
            Self::RotaPlanejada => "rota_planejada",
            Self::EquipeDesignada => "equipe_designada",
            Self::PreVisitaCompleta => "pre_visita_completa",
            Self::EmDeslocamento => "em_deslocamento",
            Self::EmExecucao => "em_execucao",
            Self::ColetandoMrs => "coletando_mrs",
            Self::ColetandoMap => "coletando_map",
            Self::ValidandoDados => "validando_dados",
            Self::DadosColetados => "dados_coletados",
            Self::ProcessandoDados => "processando_dados",
            Self::ValidacaoTecnica => "validacao_tecnica",
            Self::PendenciasIdentificadas => "pendencias_identificadas",
            Self::FollowupNecessario => "followup_necessario",
            Self::DadosValidados => "dados_validados",
            Self::RelatorioPreliminar => "relatorio_preliminar",
            Self::AprovacaoFinal => "aprovacao_final",
            Self::Realizada => "realizada",
            Self::Finalizada => "finalizada",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::SemVisita => "Sem Visita",
            Self::IdentificacaoPendente => "Identificação Pendente",
            Self::ContatosPendentes => "Contatos Pendentes",
            Self::AgendamentoPendente => "Agendamento Pendente",
            Self::Agendada => "Agendada",
            Self::ConfirmacaoPendente => "Confirmação Pendente",
            Self::EmPreparacao => "Em Preparação",
            Self::RotaPlanejada => "Rota Planejada",
            Self::EquipeDesignada => "Equipe Designada",
            Self::PreVisitaCompleta => "Pré-Visita Completa",
            Self::EmDeslocamento => "Em Deslocamento",
            Self::EmExecucao => "Em Execução",
            Self::ColetandoMrs => "Coletando MRS",
            Self::ColetandoMap => "Coletando MAP",
            Self::ValidandoDados => "Validando Dados",
            Self::DadosColetados => "Dados Coletados",
            Self::ProcessandoDados => "Processando Dados",
            Self::ValidacaoTecnica => "Validação Técnica",
            Self::PendenciasIdentificadas => "Pendências Identificadas",
            Self::FollowupNecessario => "Follow-up Necessário",
            Self::DadosValidados => "Dados Validados",
            Self::RelatorioPreliminar => "Relatório Preliminar",
            Self::AprovacaoFinal => "Aprovação Final",
            Self::Realizada => "Realizada",
            Self::Finalizada => "Finalizada",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::SemVisita => "Município ainda não tem visita planejada",
            Self::IdentificacaoPendente => "Precisa identificar entidades P1",
            Self::ContatosPendentes => "Precisa encontrar telefones/emails",
            Self::AgendamentoPendente => "Precisa agendar a visita",
            Self::Agendada => "Visita agendada mas não confirmada",
            Self::ConfirmacaoPendente => "Aguardando confirmação do município",
            Self::EmPreparacao => "Preparando materiais e documentos",
            Self::RotaPlanejada => "Rota definida e otimizada",
            Self::EquipeDesignada => "Pesquisador(es) designado(s)",
            Self::PreVisitaCompleta => "Tudo pronto para execução",
            Self::EmDeslocamento => "Equipe a caminho do município",
            Self::EmExecucao => "Visita sendo realizada no momento",
            Self::ColetandoMrs => "Coletando dados de Resíduos Sólidos",
            Self::ColetandoMap => "Coletando dados de Águas Pluviais",
            Self::ValidandoDados => "Validação in-loco dos dados",
            Self::DadosColetados => "Dados coletados mas não processados",
            Self::ProcessandoDados => "Digitação e organização",
            Self::ValidacaoTecnica => "Revisão técnica dos dados",
            Self::PendenciasIdentificadas => "Problemas encontrados",
            Self::FollowupNecessario => "Precisa retornar ao município",
            Self::DadosValidados => "Dados aprovados tecnicamente",
            Self::RelatorioPreliminar => "Relatório inicial gerado",
            Self::AprovacaoFinal => "Aguardando aprovação final",
            Self::Realizada => "Visita concluída com sucesso",
            Self::Finalizada => "Processo totalmente encerrado",
        }
    }

    pub const fn color(self) -> &'static str {
        match self {
            Self::SemVisita => "#dc3545",
            Self::IdentificacaoPendente => "#fd7e14",
            Self::ContatosPendentes => "#ffc107",
            Self::AgendamentoPendente => "#20c997",
            Self::Agendada => "#17a2b8",
            Self::ConfirmacaoPendente => "#6f42c1",
            Self::EmPreparacao => "#e83e8c",
            Self::RotaPlanejada => "#fd7e14",
            Self::EquipeDesignada => "#20c997",
            Self::PreVisitaCompleta => "#28a745",
            Self::EmDeslocamento => "#17a2b8",
            Self::EmExecucao => "#007bff",
            Self::ColetandoMrs => "#6610f2",
            Self::ColetandoMap => "#6f42c1",
            Self::ValidandoDados => "#e83e8c",
            Self::DadosColetados => "#fd7e14",
            Self::ProcessandoDados => "#ffc107",
            Self::ValidacaoTecnica => "#20c997",
            Self::PendenciasIdentificadas => "#dc3545",
            Self::FollowupNecessario => "#fd7e14",
            Self::DadosValidados => "#28a745",
            Self::RelatorioPreliminar => "#17a2b8",
            Self::AprovacaoFinal => "#6f42c1",
            Self::Realizada => "#28a745",
            Self::Finalizada => "#155724",
        }
    }

    pub const fn phase(self) -> PipelinePhase {
        match self {
            Self::SemVisita
            | Self::IdentificacaoPendente
            | Self::ContatosPendentes
            | Self::AgendamentoPendente
            | Self::Agendada => PipelinePhase::Planejamento,
            Self::ConfirmacaoPendente
            | Self::EmPreparacao
            | Self::RotaPlanejada
            | Self::EquipeDesignada
            | Self::PreVisitaCompleta => PipelinePhase::PreVisita,
            Self::EmDeslocamento
            | Self::EmExecucao
            | Self::ColetandoMrs
            | Self::ColetandoMap
            | Self::ValidandoDados => PipelinePhase::Execucao,
            Self::DadosColetados
            | Self::ProcessandoDados
            | Self::ValidacaoTecnica
            | Self::PendenciasIdentificadas
            | Self::FollowupNecessario => PipelinePhase::PosVisita,
            Self::DadosValidados
            | Self::RelatorioPreliminar
            | Self::AprovacaoFinal
            | Self::Realizada
            | Self::Finalizada => PipelinePhase::Finalizacao,
        }
    }

    pub fn is_in_flight(self) -> bool {
        Self::IN_FLIGHT.contains(&self)
    }

    pub fn view(self) -> PipelineStateView {
        PipelineStateView {
            id: self.id(),
            name: self.name(),
            description: self.description(),
            color: self.color(),
            phase: self.phase().id(),
        }
    }
}

/// Static description of a state for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineStateView {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub phase: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn taxonomy_has_five_states_per_phase() {
        for phase in PipelinePhase::ordered() {
            assert_eq!(phase.states().count(), 5, "phase {}", phase.id());
        }
        let ids: HashSet<_> = PipelineState::ALL.iter().map(|s| s.id()).collect();
        assert_eq!(ids.len(), 25);
    }

    #[test]
    fn ids_round_trip_and_match_serde() {
        for state in PipelineState::ALL {
            assert_eq!(PipelineState::from_id(state.id()), Some(state));
            let encoded = serde_json::to_value(state).expect("serialize");
            assert_eq!(encoded, serde_json::json!(state.id()));
        }
        assert!(PipelineState::from_id("desconhecido").is_none());
    }
}
