use serde::{Deserialize, Serialize};

/// Alert thresholds. Field names follow the camelCase option names the
/// dashboard settings panel stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertConfig {
    /// Days a municipality may go without scheduling before it is flagged.
    pub prazo_agendamento: u32,
    /// Days a scheduled visit may wait for execution.
    pub prazo_execucao: u32,
    /// Highest tolerated share of incomplete P1 data, in percent.
    pub limite_incompletos: u32,
    /// Failed contact attempts before a municipality is named.
    pub tentativas_falharam: u32,
    /// Minutes between forced verifications.
    pub intervalo_verificacao: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            prazo_agendamento: 7,
            prazo_execucao: 14,
            limite_incompletos: 30,
            tentativas_falharam: 3,
            intervalo_verificacao: 30,
        }
    }
}
