use crate::cli::ServeArgs;
use crate::infra::{open_store, seed_demo_catalog, AppState};
use crate::routes::with_marketplace_routes;
use affiliate_exchange::config::AppConfig;
use affiliate_exchange::error::AppError;
use affiliate_exchange::marketplace::applications::{
    ApplicationService, ApprovalPolicy, ApprovalWorker,
};
use affiliate_exchange::marketplace::tracking::TrackingService;
use affiliate_exchange::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
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
    if let Some(data_file) = args.data_file.take() {
        config.storage.data_file = Some(data_file);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(open_store(&config.storage)?);
    if config.storage.seed_demo {
        seed_demo_catalog(&store)?;
        info!("demo catalog seeded");
    }

    let policy = ApprovalPolicy::from_config(&config.approvals, &config.tracking)?;
    let application_service = Arc::new(ApplicationService::new(store.clone(), policy));
    let tracking_service = Arc::new(TrackingService::new(store));
    let worker = ApprovalWorker::new(application_service.clone(), &config.approvals).spawn();

    let app = with_marketplace_routes(application_service, tracking_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        approval_delay_secs = config.approvals.delay.as_secs(),
        tracking_base_url = config.tracking.base_url(),
        "affiliate exchange ready"
    );

    let served = axum::serve(listener, app).await;
    worker.abort();
    served?;
    Ok(())
}
