use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::ingest::SnapshotError;
use crate::survey::{AlertHistoryError, AlertLifecycleError};
use crate::telemetry::TelemetryError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Snapshot(SnapshotError),
    Alert(AlertLifecycleError),
    History(AlertHistoryError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {err}"),
            AppError::Telemetry(err) => write!(f, "telemetry error: {err}"),
            AppError::Io(err) => write!(f, "io error: {err}"),
            AppError::Server(err) => write!(f, "server error: {err}"),
            AppError::Snapshot(err) => write!(f, "snapshot error: {err}"),
            AppError::Alert(err) => write!(f, "alert error: {err}"),
            AppError::History(err) => write!(f, "alert history error: {err}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Snapshot(err) => Some(err),
            AppError::Alert(err) => Some(err),
            AppError::History(err) => Some(err),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Alert(AlertLifecycleError::UnknownAlert(_)) => StatusCode::NOT_FOUND,
            AppError::Alert(_) | AppError::Snapshot(SnapshotError::Json(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Config(_)
            | AppError::Snapshot(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<SnapshotError> for AppError {
    fn from(value: SnapshotError) -> Self {
        Self::Snapshot(value)
    }
}

impl From<AlertLifecycleError> for AppError {
    fn from(value: AlertLifecycleError) -> Self {
        Self::Alert(value)
    }
}

impl From<AlertHistoryError> for AppError {
    fn from(value: AlertHistoryError) -> Self {
        Self::History(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::AlertStatus;

    #[test]
    fn lifecycle_errors_map_to_client_statuses() {
        let unknown = AppError::from(AlertLifecycleError::UnknownAlert("x".into()));
        assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);

        let closed = AppError::from(AlertLifecycleError::AlreadyClosed {
            id: "progresso_lento".into(),
            status: AlertStatus::Resolved,
        });
        assert_eq!(closed.status_code(), StatusCode::BAD_REQUEST);

        let history = AppError::from(AlertHistoryError::Unavailable("disk".into()));
        assert_eq!(history.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn malformed_snapshot_body_is_a_bad_request() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = AppError::from(SnapshotError::from(json_err));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("snapshot error"));
    }
}
