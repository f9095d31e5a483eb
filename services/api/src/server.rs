use crate::cli::ServeArgs;
use crate::infra::{AppState, MemoryDirectory};
use crate::routes::with_registry_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use childcare_registry::config::AppConfig;
use childcare_registry::error::AppError;
use childcare_registry::store::MemoryStore;
use childcare_registry::telemetry;
use childcare_registry::workflows::merge::AccountMergeService;
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

    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(MemoryDirectory::from_env());
    let merge_service = Arc::new(AccountMergeService::new(
        store,
        directory,
        &config.import.default_country_code,
    ));

    let app = with_registry_routes(merge_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "childcare registry api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
