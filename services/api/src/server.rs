use crate::cli::ServeArgs;
use crate::infra::{seeded_api, AppState};
use crate::routes::with_compliance_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use grc_compliance::config::AppConfig;
use grc_compliance::error::AppError;
use grc_compliance::telemetry;
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

    let api = seeded_api(config.reporting)?;
    let app = with_compliance_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        page_size = config.reporting.default_page_size,
        "compliance assessment service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
