use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState};
use crate::routes::with_eligibility_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telehealth_eligibility::config::AppConfig;
use telehealth_eligibility::error::AppError;
use telehealth_eligibility::telemetry;
use telehealth_eligibility::workflows::clock::SystemClock;
use tracing::{info, warn};

const PRELOAD_RETRY: Duration = Duration::from_secs(30);

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(build_service(
        config.reference.data_dir.clone(),
        config.reference.cache_ttl,
        config.analysis.clone(),
        Arc::new(SystemClock),
    ));

    let app = with_eligibility_routes(service.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let data_dir = config.reference.data_dir.clone();
    tokio::spawn(async move {
        loop {
            match service.preload().await {
                Ok(()) => {
                    readiness_flag.store(true, Ordering::Release);
                    info!(data_dir = %data_dir.display(), "reference snapshot loaded");
                    break;
                }
                Err(err) => {
                    warn!(
                        data_dir = %data_dir.display(),
                        error = %err,
                        "reference snapshot unavailable, retrying"
                    );
                    tokio::time::sleep(PRELOAD_RETRY).await;
                }
            }
        }
    });

    info!(
        ?config.environment,
        %addr,
        tier = ?config.analysis.tier,
        max_postcodes = config.analysis.max_postcodes,
        "telehealth eligibility service listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
