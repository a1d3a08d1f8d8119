use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryEngagementRepository};
use crate::routes::with_engagement_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use engagement_tracker::config::AppConfig;
use engagement_tracker::error::AppError;
use engagement_tracker::telemetry;
use engagement_tracker::workflows::engagement::EngagementService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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

    let repository = Arc::new(InMemoryEngagementRepository::default());
    let engagement_service = Arc::new(EngagementService::new(
        repository,
        config.scoring.clone(),
    ));

    let app = with_engagement_routes(engagement_service, config.ingest.max_upload_bytes)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        page_size = config.scoring.recompute_page_size,
        "engagement tracker ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
