use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use pnsb_progress::config::AppConfig;
use pnsb_progress::error::AppError;
use pnsb_progress::poller::{PollerSettings, ProgressPoller};
use pnsb_progress::survey::ProgressService;
use pnsb_progress::telemetry;
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::infra::{AppState, ConfiguredSource, InMemoryAlertHistory};
use crate::routes::with_progress_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(snapshot) = args.snapshot.take() {
        config.snapshot_path = Some(snapshot);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.snapshot_path.is_none() {
        warn!("APP_SNAPSHOT_PATH not set; serving an empty snapshot");
    }
    let source = ConfiguredSource::from_path(config.snapshot_path.clone());
    let poller = Arc::new(ProgressPoller::new(
        source,
        PollerSettings {
            calendar: config.survey,
            alerts: config.alerts,
            refresh: config.refresh,
        },
    ));
    if let Err(err) = poller.refresh_kpis(Utc::now().naive_utc()) {
        warn!(error = %err, "initial snapshot refresh failed");
    }
    let poller_handle = poller.spawn();

    let history = Arc::new(InMemoryAlertHistory::default());
    let service = Arc::new(ProgressService::new(poller, history));

    let app = with_progress_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "survey progress service ready");

    let served = axum::serve(listener, app).await;
    poller_handle.shutdown();
    served?;
    Ok(())
}
