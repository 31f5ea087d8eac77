use crate::cli::ServeArgs;
use crate::infra::{load_scorer, AppState, InMemoryHistoryRepository, InMemoryUserRepository};
use crate::routes::with_assessment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use cardio_advisor::assessment::{AssessmentService, Scorer, SqliteStore, TokenIssuer};
use cardio_advisor::config::AppConfig;
use cardio_advisor::error::AppError;
use cardio_advisor::telemetry;
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

    let scorer: Arc<dyn Scorer> = Arc::new(load_scorer(&config.model)?);
    let tokens = TokenIssuer::new(&config.auth.secret, config.auth.access_token_ttl());

    let routes = match &config.storage.database_path {
        Some(path) => {
            let store = Arc::new(SqliteStore::open(path)?);
            info!(path = %path.display(), "using sqlite storage");
            with_assessment_routes(Arc::new(AssessmentService::new(
                store.clone(),
                store,
                scorer,
                tokens,
            )))
        }
        None => {
            info!("using in-memory storage");
            with_assessment_routes(Arc::new(AssessmentService::new(
                Arc::new(InMemoryUserRepository::default()),
                Arc::new(InMemoryHistoryRepository::default()),
                scorer,
                tokens,
            )))
        }
    };

    let app = routes
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "cardio advisor ready");

    axum::serve(listener, app).await?;
    Ok(())
}
