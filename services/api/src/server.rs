use crate::cli::ServeArgs;
use crate::infra::{build_appeal_service, AppState};
use crate::routes::with_appeal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use disability_appeal::config::AppConfig;
use disability_appeal::error::AppError;
use disability_appeal::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
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

    let appeal_service = Arc::new(build_appeal_service(&config)?);

    let app = with_appeal_routes(appeal_service)
        .layer(Extension(app_state))
        .layer(CorsLayer::permissive())
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        database = %config.storage.database_path,
        "disability appeal intake ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
