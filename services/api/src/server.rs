use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryAnalysisCache, InMemoryApplicationRepository, InMemoryAuditTrail,
    InMemoryNotifier, InMemoryPolicyStore,
};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use loanlens::config::AppConfig;
use loanlens::error::AppError;
use loanlens::telemetry;
use loanlens::workflows::lending::analysis::ScoringConfig;
use loanlens::workflows::lending::applications::LoanApplicationService;
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

    let repository = Arc::new(InMemoryApplicationRepository::default());
    let notifier = Arc::new(InMemoryNotifier::default());
    let cache = Arc::new(InMemoryAnalysisCache::default());
    let audit = Arc::new(InMemoryAuditTrail::default());
    let policy_store = Arc::new(InMemoryPolicyStore::default());

    // No external analyst is wired into this binary; every application is
    // scored by the deterministic pipeline. An LLM-backed RiskAnalyst slots
    // in here once credentials exist for it.
    let application_service = Arc::new(LoanApplicationService::new(
        repository,
        notifier,
        cache,
        audit,
        policy_store,
        None,
        ScoringConfig::default(),
        config.analysis.clone(),
    ));

    let app = with_application_routes(application_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan screening service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
