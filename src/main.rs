use axum::{
    Router,
    http::{HeaderName, header},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tally::{
    InMemoryActivityLog, InMemoryCache, InMemoryNotifier, InMemoryStorage, LedgerService,
    api::{
        handlers::{IDEMPOTENCY_KEY_HEADER, api_routes},
        openapi::ApiDoc,
    },
    config::CONFIG,
    core::retry::RetryPolicy,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG wins over LOG_LEVEL when both are set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&CONFIG.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(config = ?*CONFIG, "starting");

    // Initialize storage, activity log, cache and change feed
    let storage = InMemoryStorage::new();
    let activity = InMemoryActivityLog::new();
    let cache = InMemoryCache::new();
    let notifier = InMemoryNotifier::new();
    let service = Arc::new(
        LedgerService::new(storage, activity, cache, notifier, CONFIG.jwt_secret.clone())
            .with_retry_policy(RetryPolicy::from_config(&CONFIG)),
    );

    let app = Router::new()
        .route("/", get(|| async { "OK" }))
        .nest("/api", api_routes(service))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(CONFIG.request_timeout_secs)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([http::Method::GET, http::Method::POST])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    HeaderName::from_static(IDEMPOTENCY_KEY_HEADER),
                ]),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], CONFIG.port));
    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
