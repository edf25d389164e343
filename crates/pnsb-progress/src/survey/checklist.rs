//! Three-phase field visit checklist and its completeness.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::status::percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistPhase {
    Antes,
    Durante,
    Apos,
}

impl ChecklistPhase {
    pub const fn ordered() -> [Self; 3] {
        [Self::Antes, Self::Durante, Self::Apos]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Antes => "Antes da Visita",
            Self::Durante => "Durante a Visita",
            Self::Apos => "Após a Visita",
        }
    }

    pub const fn items(self) -> &'static [ChecklistItem] {
        match self {
            Self::Antes => ANTES,
            Self::Durante => DURANTE,
            Self::Apos => APOS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecklistItem {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mandatory: bool,
}

const fn item(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    mandatory: bool,
) -> ChecklistItem {
    ChecklistItem {
        id,
        name,
        description,
        mandatory,
    }
}

const ANTES: &[ChecklistItem] = &[
    item("cracha_ibge", "Crachá IBGE", "Portar identificação oficial do IBGE", true),
    item("questionarios_impressos", "Questionários Impressos", "Formulários MRS e MAP impressos", true),
    item("materiais_apoio", "Materiais de Apoio", "Canetas, prancheta, calculadora", true),
    item("contato_previo", "Contato Prévio", "Confirmação por telefone/WhatsApp", true),
    item("endereco_confirmado", "Endereço Confirmado", "Localização exata da prefeitura", true),
    item("horario_funcionamento", "Horário de Funcionamento", "Verificar horários de atendimento", true),
    item("backup_contatos", "Backup de Contatos", "Contatos alternativos anotados", false),
    item("documentos_apresentacao", "Documentos de Apresentação", "Ofício, carta de apresentação", true),
    item("lista_entidades", "Lista de Entidades", "Entidades P1 identificadas previamente", true),
    item("mapa_regiao", "Mapa da Região", "Mapa físico ou digital da cidade", false),
    item("telefone_carregado", "Telefone Carregado", "Bateria e carregador portátil", true),
    item("equipamentos_funcionando", "Equipamentos Funcionando", "Tablet, GPS, câmera testados", true),
    item("cronograma_dia", "Cronograma do Dia", "Roteiro e horários planejados", true),
];

const DURANTE: &[ChecklistItem] = &[
    item("apresentacao_pesquisador", "Apresentação do Pesquisador", "Identificação e apresentação formal", true),
    item("explicacao_pnsb", "Explicação da PNSB", "Objetivos e importância da pesquisa", true),
    item("validacao_dados", "Validação de Dados", "Confirmar informações preliminares", true),
    item("questionario_mrs", "Questionário MRS", "Manejo de Resíduos Sólidos completo", true),
    item("questionario_map", "Questionário MAP", "Manejo de Águas Pluviais completo", true),
    item("fotos_evidencia", "Fotos de Evidência", "Documentação fotográfica", true),
    item("assinaturas_coletadas", "Assinaturas Coletadas", "Responsáveis técnicos assinaram", true),
    item("contatos_adicionais", "Contatos Adicionais", "Novos contatos identificados", false),
    item("observacoes_campo", "Observações de Campo", "Anotações importantes registradas", true),
    item("problemas_identificados", "Problemas Identificados", "Dificuldades e limitações anotadas", false),
    item("proximos_passos", "Próximos Passos", "Follow-up necessário definido", false),
];

const APOS: &[ChecklistItem] = &[
    item("questionarios_entregues", "Questionários Entregues", "Formulários digitalizados no sistema", true),
    item("followup_agendado", "Follow-up Agendado", "Próximas ações programadas se necessário", false),
    item("dados_digitalizados", "Dados Digitalizados", "Todas informações inseridas no sistema", true),
    item("evidencias_organizadas", "Evidências Organizadas", "Fotos e documentos catalogados", true),
    item("relatorio_resumo", "Relatório Resumo", "Relatório da visita elaborado", true),
];

/// Checked items per phase for one municipality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistRecord {
    #[serde(default, deserialize_with = "checked_items")]
    pub antes: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "checked_items")]
    pub durante: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "checked_items")]
    pub apos: BTreeMap<String, bool>,
}

fn checked_items<'de, D>(deserializer: D) -> Result<BTreeMap<String, bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(entries) = value else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .into_iter()
        .map(|(id, checked)| {
            let checked = match checked {
                Value::Bool(flag) => flag,
                Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
                Value::String(raw) => !raw.trim().is_empty(),
                _ => false,
            };
            (id, checked)
        })
        .collect())
}

impl ChecklistRecord {
    fn phase(&self, phase: ChecklistPhase) -> &BTreeMap<String, bool> {
        match phase {
            ChecklistPhase::Antes => &self.antes,
            ChecklistPhase::Durante => &self.durante,
            ChecklistPhase::Apos => &self.apos,
        }
    }

    pub fn is_checked(&self, phase: ChecklistPhase, item_id: &str) -> bool {
        self.phase(phase).get(item_id).copied().unwrap_or(false)
    }

    pub fn mark(&mut self, phase: ChecklistPhase, item_id: &str, checked: bool) {
        let items = match phase {
            ChecklistPhase::Antes => &mut self.antes,
            ChecklistPhase::Durante => &mut self.durante,
            ChecklistPhase::Apos => &mut self.apos,
        };
        items.insert(item_id.to_string(), checked);
    }

    /// Completeness of the known items only; unknown ids are ignored.
    pub fn completeness(&self) -> ChecklistCompleteness {
        let phases: Vec<PhaseCompleteness> = ChecklistPhase::ordered()
            .into_iter()
            .map(|phase| {
                let items = phase.items();
                let completed = items
                    .iter()
                    .filter(|item| self.is_checked(phase, item.id))
                    .count();
                PhaseCompleteness {
                    phase,
                    label: phase.label(),
                    completed,
                    total: items.len(),
                    percent: percent(completed, items.len()),
                }
            })
            .collect();

        let completed = phases.iter().map(|phase| phase.completed).sum();
        let total = phases.iter().map(|phase| phase.total).sum();

        let missing_mandatory = ChecklistPhase::ordered()
            .into_iter()
            .flat_map(|phase| {
                phase
                    .items()
                    .iter()
                    .filter(move |item| item.mandatory && !self.is_checked(phase, item.id))
                    .map(move |item| MissingItem {
                        phase,
                        id: item.id,
                        name: item.name,
                    })
            })
            .collect();

        ChecklistCompleteness {
            phases,
            completed,
            total,
            percent: percent(completed, total),
            missing_mandatory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseCompleteness {
    pub phase: ChecklistPhase,
    pub label: &'static str,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingItem {
    pub phase: ChecklistPhase,
    pub id: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistCompleteness {
    pub phases: Vec<PhaseCompleteness>,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    pub missing_mandatory: Vec<MissingItem>,
}

impl ChecklistCompleteness {
    pub fn ready(&self) -> bool {
        self.missing_mandatory.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_matches_phase_sizes() {
        assert_eq!(ChecklistPhase::Antes.items().len(), 13);
        assert_eq!(ChecklistPhase::Durante.items().len(), 11);
        assert_eq!(ChecklistPhase::Apos.items().len(), 5);
        let mandatory: usize = ChecklistPhase::ordered()
            .iter()
            .map(|phase| phase.items().iter().filter(|i| i.mandatory).count())
            .sum();
        assert_eq!(mandatory, 23);
    }

    #[test]
    fn empty_record_reports_every_mandatory_item() {
        let completeness = ChecklistRecord::default().completeness();
        assert_eq!(completeness.total, 29);
        assert_eq!(completeness.completed, 0);
        assert_eq!(completeness.percent, 0);
        assert_eq!(completeness.missing_mandatory.len(), 23);
        assert!(!completeness.ready());
    }

    #[test]
    fn completeness_counts_known_items_only() {
        let mut record = ChecklistRecord::default();
        for item in ChecklistPhase::Apos.items() {
            record.mark(ChecklistPhase::Apos, item.id, true);
        }
        record.mark(ChecklistPhase::Antes, "item_inexistente", true);

        let completeness = record.completeness();
        assert_eq!(completeness.phases[2].percent, 100);
        assert_eq!(completeness.phases[0].completed, 0);
        assert_eq!(completeness.completed, 5);
        assert_eq!(completeness.percent, 17);
    }

    #[test]
    fn record_decodes_loose_flags() {
        let record: ChecklistRecord = serde_json::from_value(serde_json::json!({
            "antes": {"cracha_ibge": true, "mapa_regiao": 0, "contato_previo": "ok"},
            "durante": []
        }))
        .expect("record decodes");
        assert!(record.is_checked(ChecklistPhase::Antes, "cracha_ibge"));
        assert!(!record.is_checked(ChecklistPhase::Antes, "mapa_regiao"));
        assert!(record.is_checked(ChecklistPhase::Antes, "contato_previo"));
        assert!(record.durante.is_empty());
    }
}
