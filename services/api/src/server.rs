use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_listing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use housing_listings::config::AppConfig;
use housing_listings::error::AppError;
use housing_listings::listings::{
    CacheBackend, ListingCache, ListingService, StoreBackend, TokenAuthority,
};
use housing_listings::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(StoreBackend::from_config(&config.storage).await?);
    let cache = Arc::new(CacheBackend::from_config(&config.storage).await?);
    info!(
        store = store.label(),
        cache = cache.label(),
        ttl_secs = config.storage.cache_ttl.as_secs(),
        "listing backends selected"
    );

    let service = Arc::new(ListingService::new(
        store,
        ListingCache::new(cache, config.storage.cache_ttl),
    ));
    let tokens = Arc::new(TokenAuthority::from_config(&config.auth));

    let app = with_listing_routes(service, tokens)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "housing listings service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
