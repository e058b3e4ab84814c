use crate::config::Config;
use crate::endpoints::Params;
use crate::errors::AppError;
use crate::pipeline::{ReportPipeline, WrapperOutput};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Response header telling callers whether the body went through the optimizer.
pub const OPTIMIZED_HEADER: HeaderName = HeaderName::from_static("x-wrapper-optimized");

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Resolve -> fetch -> optimize -> aggregate -> cache.
    pub pipeline: ReportPipeline,
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "report-wrapper",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /endpoints
///
/// Lists the endpoint keys the registry knows about.
pub async fn list_endpoints(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let registry = state.pipeline.registry();
    let endpoints: serde_json::Map<String, serde_json::Value> = registry
        .keys()
        .into_iter()
        .filter_map(|key| {
            let endpoint = registry.resolve(&key).ok()?;
            Some((
                key,
                json!({
                    "path": endpoint.path,
                    "default_params": endpoint.default_params.keys().collect::<Vec<_>>(),
                }),
            ))
        })
        .collect();

    Json(json!({
        "upstream": state.config.base_url,
        "endpoints": endpoints,
    }))
}

/// GET /wrapper/:endpoint_key
///
/// Fetches the upstream report and answers with the dashboard, or with the
/// optimized (`full=true`) or raw (`raw=true`) document.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `endpoint_key` - Registry key, or a literal upstream path.
/// * `query` - Forwarded to the upstream call, minus the reserved flags.
///
/// # Returns
///
/// * `Result<Response, AppError>` - JSON body; 404 for an unknown key, 502 when
///   the upstream call fails.
pub async fn wrapper_get(
    State(state): State<Arc<AppState>>,
    Path(endpoint_key): Path<String>,
    Query(query): Query<Params>,
) -> Result<Response, AppError> {
    tracing::info!("GET /wrapper/{} - params: {:?}", endpoint_key, query);

    let output = state.pipeline.run(&endpoint_key, query).await?;
    let response = match output {
        WrapperOutput::Dashboard(payload) => Json(payload).into_response(),
        WrapperOutput::Optimized(doc) => (
            [(OPTIMIZED_HEADER, HeaderValue::from_static("true"))],
            Json(doc),
        )
            .into_response(),
        WrapperOutput::Raw(doc) => (
            [(OPTIMIZED_HEADER, HeaderValue::from_static("false"))],
            Json(doc),
        )
            .into_response(),
    };

    tracing::info!("✓ /wrapper/{} answered", endpoint_key);
    Ok(response)
}
