use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryNoticePublisher, MemoryProofVault, ProofVault};
use crate::routes::with_track_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use trackline::config::AppConfig;
use trackline::error::AppError;
use trackline::telemetry;
use trackline::workflows::tracks::{MemoryTrackStore, TrackService};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(MemoryTrackStore::default());
    let notices = Arc::new(InMemoryNoticePublisher::default());
    let track_service = Arc::new(TrackService::new(store, notices));
    let proof_vault: Arc<dyn ProofVault> =
        Arc::new(MemoryProofVault::new(config.proofs.max_proof_bytes));

    let app = with_track_routes(track_service)
        .layer(Extension(app_state))
        .layer(Extension(proof_vault))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "trackline service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
