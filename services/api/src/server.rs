use crate::cli::ServeArgs;
use crate::demo::demo_seed;
use crate::infra::{AppState, SeedData};
use crate::routes::with_pricing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use unit_pricing::config::AppConfig;
use unit_pricing::error::AppError;
use unit_pricing::telemetry;
use unit_pricing::workflows::pricing::PricingService;

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

    let seed = match config.pricing.seed_path.as_deref() {
        Some(path) => {
            info!(path = %path.display(), "loading pricing seed data");
            SeedData::from_path(path)?
        }
        None => {
            info!("APP_SEED_PATH not set, serving the demo object");
            demo_seed()
        }
    };
    let (objects, distributions) = seed.into_repositories()?;
    info!(
        objects = objects.len(),
        distribution_configs = distributions.len(),
        "in-memory stores ready"
    );

    let pricing_service = Arc::new(PricingService::new(
        Arc::new(objects),
        Arc::new(distributions),
        config.pricing.pipeline_settings(),
    ));

    let app = with_pricing_routes(pricing_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        fit_rate_source = config.pricing.fit_rate_source.label(),
        "unit pricing service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
