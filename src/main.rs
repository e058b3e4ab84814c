use axum::{routing::get, Router};
use report_wrapper::cache_store::CacheStore;
use report_wrapper::config::Config;
use report_wrapper::endpoints::EndpointRegistry;
use report_wrapper::handlers::{self, AppState};
use report_wrapper::pipeline::ReportPipeline;
use report_wrapper::report_client::ReportApiClient;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the report wrapper.
///
/// Initializes logging, configuration, the endpoint registry, the upstream
/// client and the cache store, then serves the HTTP surface.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "report_wrapper=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let registry = Arc::new(EndpointRegistry::load(&config.endpoints_file)?);

    let client = ReportApiClient::new(
        config.base_url.clone(),
        config.api_key.clone(),
        config.upstream_timeout(),
    )?;
    tracing::info!("✓ Report API client initialized: {}", config.base_url);

    let cache = CacheStore::new(config.cache_dir.clone());
    tracing::info!("✓ Cache store at {}", config.cache_dir.display());

    let app_state = Arc::new(AppState {
        config: config.clone(),
        pipeline: ReportPipeline::new(registry, client, cache),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        .route("/endpoints", get(handlers::list_endpoints))
        .route("/wrapper/:endpoint_key", get(handlers::wrapper_get))
        .layer(
            ServiceBuilder::new()
                // Requests are GETs; anything bigger than 1MB is not ours
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // SmartIpKeyExtractor falls back to the peer address
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
