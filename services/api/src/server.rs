use crate::cli::ServeArgs;
use crate::infra::{AppState, LendingService, StoreHandles};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loanflow::config::{AppConfig, ConfigError};
use loanflow::error::AppError;
use loanflow::telemetry;
use loanflow::workflows::lending::{DecisionConfig, DecisionEngine, LoanApplicationService};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(threshold) = args.threshold.take() {
        config.decision = DecisionConfig::new(threshold)
            .map_err(|_| ConfigError::InvalidThreshold(threshold.to_string()))?;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let stores = StoreHandles::open(&config.stores).await?;
    let engine = Arc::new(DecisionEngine::new(config.decision));
    let lending_service: Arc<LendingService> = Arc::new(LoanApplicationService::new(
        stores.identity.clone(),
        stores.audit.clone(),
        engine,
        config.stores.timeouts,
    ));

    let app = with_application_routes(lending_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        threshold = config.decision.threshold(),
        "loan application service ready"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    readiness_flag.store(false, Ordering::Release);
    stores.close().await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
