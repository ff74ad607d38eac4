use crate::cli::ServeArgs;
use crate::infra::{AppState, AuditLogHooks, InMemoryRecordStore};
use crate::routes::with_wizard_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rodo_forms::config::AppConfig;
use rodo_forms::error::AppError;
use rodo_forms::telemetry;
use rodo_forms::workflows::catalog::FormCatalog;
use rodo_forms::workflows::forms::{SubmissionCoordinator, WizardService};
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

    let catalog = Arc::new(FormCatalog::standard()?);
    let coordinator = SubmissionCoordinator::new(Arc::new(InMemoryRecordStore::default()))
        .with_hooks(Arc::new(AuditLogHooks))
        .with_timeout(config.submission.timeout());
    let wizard_service = Arc::new(WizardService::new(catalog, coordinator));

    let app = with_wizard_routes(wizard_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        environment = config.environment.label(),
        %addr,
        submit_timeout_ms = config.submission.timeout_ms,
        "rodo forms host ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
