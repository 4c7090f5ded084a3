use crate::cli::ServeArgs;
use crate::infra::{build_storage, AppState, LogMailer};
use crate::routes::with_submission_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use form_filer::config::{AppConfig, RoutingConfig};
use form_filer::error::AppError;
use form_filer::telemetry;
use form_filer::workflows::intake::{Mailer, StorageGateway, SubmissionOrchestrator};
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

    let routing = RoutingConfig::load()?;
    routing.validate()?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let storage = build_storage(&config, args.in_memory).await?;
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
    let orchestrator: Arc<SubmissionOrchestrator<dyn StorageGateway, dyn Mailer>> =
        Arc::new(SubmissionOrchestrator::new(storage, mailer, routing));

    let app = with_submission_routes(orchestrator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "form filer ready");

    axum::serve(listener, app).await?;
    Ok(())
}
