use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use super::alerts::{AlertHistoryRepository, AlertLifecycleError};
use super::service::{ProgressService, ProgressServiceError, ReportRequest};
use crate::ingest::{SnapshotError, SnapshotSource};

type SharedService<S, H> = Arc<ProgressService<S, H>>;

/// Router exposing the derived dashboard and the alert acknowledgement
/// endpoints.
pub fn progress_router<S, H>(service: SharedService<S, H>) -> Router
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    Router::new()
        .route("/api/v1/progress/dashboard", get(dashboard_handler::<S, H>))
        .route("/api/v1/progress/kpis", get(kpis_handler::<S, H>))
        .route(
            "/api/v1/progress/municipalities",
            get(municipalities_handler::<S, H>),
        )
        .route("/api/v1/progress/pipeline", get(pipeline_handler::<S, H>))
        .route(
            "/api/v1/progress/pipeline/states",
            get(pipeline_states_handler::<S, H>),
        )
        .route("/api/v1/progress/alerts", get(alerts_handler::<S, H>))
        .route(
            "/api/v1/progress/alerts/:alert_id/resolve",
            post(resolve_handler::<S, H>),
        )
        .route(
            "/api/v1/progress/alerts/:alert_id/ignore",
            post(ignore_handler::<S, H>),
        )
        .route("/api/v1/progress/report", post(report_handler::<S, H>))
        .with_state(service)
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn respond<T: Serialize>(result: Result<T, ProgressServiceError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Service calls read the snapshot source, which may block on file I/O.
async fn blocking<S, H, T, F>(service: SharedService<S, H>, job: F) -> Response
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
    T: Serialize + Send + 'static,
    F: FnOnce(&ProgressService<S, H>) -> Result<T, ProgressServiceError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || job(&service)).await {
        Ok(result) => respond(result),
        Err(err) => {
            error!("progress request task failed: {err}");
            let payload = json!({
                "error": "internal error",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn error_response(error: ProgressServiceError) -> Response {
    let status = match &error {
        ProgressServiceError::Lifecycle(AlertLifecycleError::UnknownAlert(_)) => {
            StatusCode::NOT_FOUND
        }
        ProgressServiceError::Lifecycle(_)
        | ProgressServiceError::Snapshot(SnapshotError::Json(_)) => StatusCode::BAD_REQUEST,
        ProgressServiceError::Snapshot(_) | ProgressServiceError::History(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn dashboard_handler<S, H>(
    State(service): State<SharedService<S, H>>,
) -> Response
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    let now = now();
    blocking(service, move |service| service.dashboard(now)).await
}

pub(crate) async fn kpis_handler<S, H>(State(service): State<SharedService<S, H>>) -> Response
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    let now = now();
    blocking(service, move |service| service.kpis(now)).await
}

pub(crate) async fn municipalities_handler<S, H>(
    State(service): State<SharedService<S, H>>,
) -> Response
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    let now = now();
    blocking(service, move |service| service.municipalities(now)).await
}

pub(crate) async fn pipeline_handler<S, H>(
    State(service): State<SharedService<S, H>>,
) -> Response
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    let now = now();
    blocking(service, move |service| {
        service.pipeline(now).map(|(buckets, summary)| {
            json!({
                "summary": summary,
                "buckets": buckets,
            })
        })
    })
    .await
}

pub(crate) async fn pipeline_states_handler<S, H>(
    State(service): State<SharedService<S, H>>,
) -> Response
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    (StatusCode::OK, axum::Json(service.pipeline_states())).into_response()
}

pub(crate) async fn alerts_handler<S, H>(State(service): State<SharedService<S, H>>) -> Response
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    let now = now();
    blocking(service, move |service| service.alerts(now)).await
}

pub(crate) async fn resolve_handler<S, H>(
    State(service): State<SharedService<S, H>>,
    Path(alert_id): Path<String>,
) -> Response
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    let now = now();
    blocking(service, move |service| service.resolve(&alert_id, now)).await
}

pub(crate) async fn ignore_handler<S, H>(
    State(service): State<SharedService<S, H>>,
    Path(alert_id): Path<String>,
) -> Response
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    let now = now();
    blocking(service, move |service| service.ignore(&alert_id, now)).await
}

pub(crate) async fn report_handler<S, H>(
    State(service): State<SharedService<S, H>>,
    axum::Json(request): axum::Json<ReportRequest>,
) -> Response
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    blocking(service, move |service| Ok(service.report(request))).await
}
