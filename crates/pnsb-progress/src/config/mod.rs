use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;

use crate::survey::{AlertConfig, SurveyCalendar};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the dashboard service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub refresh: RefreshConfig,
    pub survey: SurveyCalendar,
    pub alerts: AlertConfig,
    pub snapshot_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let refresh = RefreshConfig {
            kpi_interval: Duration::from_secs(number("APP_KPI_REFRESH_SECS", 300)?),
            alert_interval: Duration::from_secs(number("APP_ALERT_REFRESH_SECS", 60)?),
            cache_ttl: Duration::from_secs(number("APP_CACHE_TTL_SECS", 300)?),
            cache_clear_interval: Duration::from_secs(number("APP_CACHE_CLEAR_SECS", 1800)?),
        };

        let defaults = SurveyCalendar::default();
        let survey = SurveyCalendar::new(
            date("APP_SURVEY_START", defaults.start)?,
            date("APP_SURVEY_DEADLINE", defaults.deadline)?,
        );
        if survey.deadline < survey.start {
            return Err(ConfigError::InvalidDate {
                var: "APP_SURVEY_DEADLINE",
            });
        }

        let fallback = AlertConfig::default();
        let alerts = AlertConfig {
            prazo_agendamento: number("APP_ALERT_PRAZO_AGENDAMENTO", fallback.prazo_agendamento)?,
            prazo_execucao: number("APP_ALERT_PRAZO_EXECUCAO", fallback.prazo_execucao)?,
            limite_incompletos: number("APP_ALERT_LIMITE_INCOMPLETOS", fallback.limite_incompletos)?,
            tentativas_falharam: number("APP_ALERT_TENTATIVAS_FALHARAM", fallback.tentativas_falharam)?,
            intervalo_verificacao: number(
                "APP_ALERT_INTERVALO_VERIFICACAO",
                fallback.intervalo_verificacao,
            )?,
        };

        let snapshot_path = env::var("APP_SNAPSHOT_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            refresh,
            survey,
            alerts,
            snapshot_path,
        })
    }
}

fn number<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var }),
        _ => Ok(default),
    }
}

fn date(var: &'static str, default: NaiveDate) -> Result<NaiveDate, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| ConfigError::InvalidDate { var }),
        _ => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Poller cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
    pub kpi_interval: Duration,
    pub alert_interval: Duration,
    pub cache_ttl: Duration,
    pub cache_clear_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            kpi_interval: Duration::from_secs(300),
            alert_interval: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(300),
            cache_clear_interval: Duration::from_secs(1800),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
    InvalidDate { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => {
                write!(f, "{var} must be a non-negative whole number")
            }
            ConfigError::InvalidDate { var } => {
                write!(f, "{var} must be a YYYY-MM-DD date within the survey window")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidDate { .. } => None,
        }
    }
}
