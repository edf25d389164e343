use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use pnsb_progress::ingest::SnapshotSource;
use pnsb_progress::survey::{progress_router, AlertHistoryRepository, ProgressService};
use serde_json::json;

use crate::infra::AppState;

pub(crate) fn with_progress_routes<S, H>(service: Arc<ProgressService<S, H>>) -> axum::Router
where
    S: SnapshotSource + 'static,
    H: AlertHistoryRepository + 'static,
{
    progress_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    if ready {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{ConfiguredSource, InMemoryAlertHistory};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use pnsb_progress::poller::{PollerSettings, ProgressPoller};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let poller = Arc::new(ProgressPoller::new(
            ConfiguredSource::from_path(None),
            PollerSettings::default(),
        ));
        let service = Arc::new(ProgressService::new(
            poller,
            Arc::new(InMemoryAlertHistory::default()),
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_progress_routes(service).layer(Extension(state))
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (
            status,
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null),
        )
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let (status, body) = get(app(false), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "initializing");

        let (status, body) = get(app(true), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn progress_routes_are_mounted_next_to_health() {
        let (status, body) = get(app(true), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = get(app(true), "/api/v1/progress/municipalities").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(11));
    }

    #[test]
    fn readiness_flag_is_shared() {
        let flag = Arc::new(AtomicBool::new(false));
        let state = AppState {
            readiness: flag.clone(),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        flag.store(true, Ordering::Release);
        assert!(state.readiness.load(Ordering::Acquire));
    }
}
