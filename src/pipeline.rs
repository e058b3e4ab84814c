//! Request orchestration: resolve -> fetch -> optimize -> aggregate -> cache.

use crate::cache_store::{Artifact, CacheStore};
use crate::comparison::{compare, render, ComparisonMetrics, ReportContext};
use crate::dashboard::{
    build_dashboard_payload, build_overview, compare_periods, previous_month_range,
    DashboardPayload, OverviewMetrics, PeriodComparison,
};
use crate::endpoints::{merge_params, EndpointConfig, EndpointRegistry, Params};
use crate::errors::{AppError, ResultExt};
use crate::optimizer::optimize;
use crate::report_client::ReportApiClient;
use crate::timestamps::parse_timestamp;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Reserved query flag: return the optimized document.
pub const FLAG_FULL: &str = "full";
/// Reserved query flag: return the raw upstream document.
pub const FLAG_RAW: &str = "raw";
/// Reserved query flag: attach the previous-month comparison to the dashboard.
pub const FLAG_COMPARE: &str = "compare";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Dashboard,
    Optimized,
    Raw,
}

/// Output selection taken from the reserved query flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestFlags {
    pub view: View,
    pub compare_previous: bool,
}

fn parse_flag(name: &str, value: Option<String>) -> Result<bool, AppError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::BadRequest(format!(
            "Invalid value for '{}': {}",
            name, other
        ))),
    }
}

impl RequestFlags {
    /// Removes the reserved flags from `query` so they are never forwarded upstream.
    pub fn extract(query: &mut Params) -> Result<Self, AppError> {
        let full = parse_flag(FLAG_FULL, query.remove(FLAG_FULL))?;
        let raw = parse_flag(FLAG_RAW, query.remove(FLAG_RAW))?;
        let compare_previous = parse_flag(FLAG_COMPARE, query.remove(FLAG_COMPARE))?;

        let view = match (full, raw) {
            (true, true) => {
                return Err(AppError::BadRequest(format!(
                    "'{}' and '{}' cannot be combined",
                    FLAG_FULL, FLAG_RAW
                )))
            }
            (true, false) => View::Optimized,
            (false, true) => View::Raw,
            (false, false) => View::Dashboard,
        };
        Ok(Self {
            view,
            compare_previous,
        })
    }
}

/// One of the three representations the wrapper returns.
#[derive(Debug, Clone)]
pub enum WrapperOutput {
    Raw(Value),
    Optimized(Value),
    Dashboard(DashboardPayload),
}

/// Paths of a written comparison report plus its metrics.
#[derive(Debug, Clone)]
pub struct ComparisonArtifacts {
    pub markdown: PathBuf,
    pub html: PathBuf,
    pub metrics_json: PathBuf,
    pub metrics: ComparisonMetrics,
}

/// Computes, renders and stores the raw-vs-optimized comparison.
pub async fn write_comparison_report(
    cache: &CacheStore,
    endpoint_key: &str,
    params: &Params,
    raw: &Value,
    optimized: &Value,
) -> Result<ComparisonArtifacts, AppError> {
    let metrics = compare(raw, optimized);
    let ctx = ReportContext {
        endpoint_key: endpoint_key.to_string(),
        params: params.clone(),
        generated_at: Utc::now(),
    };
    let rendered = render(raw, optimized, &metrics, &ctx);

    let markdown = cache
        .write_text(endpoint_key, params, Artifact::ComparisonMarkdown, &rendered.markdown)
        .await?;
    let html = cache
        .write_text(endpoint_key, params, Artifact::ComparisonHtml, &rendered.html)
        .await?;
    let metrics_json = cache
        .write_json(endpoint_key, params, Artifact::ComparisonMetrics, &metrics)
        .await?;

    Ok(ComparisonArtifacts {
        markdown,
        html,
        metrics_json,
        metrics,
    })
}

/// Builds the comparison report from the cached raw/optimized pair.
///
/// Returns `Ok(None)` when the pair is missing or unreadable.
pub async fn compare_from_cache(
    cache: &CacheStore,
    endpoint_key: &str,
    params: Option<&Params>,
) -> Result<Option<ComparisonArtifacts>, AppError> {
    let Some((raw, optimized)) = cache.load_pair(endpoint_key, params).await else {
        tracing::info!("No cached raw/optimized pair for {}", endpoint_key);
        return Ok(None);
    };
    let empty = Params::new();
    let artifacts =
        write_comparison_report(cache, endpoint_key, params.unwrap_or(&empty), &raw, &optimized)
            .await?;
    Ok(Some(artifacts))
}

/// Sequences one wrapper call. Cheap to clone.
#[derive(Clone)]
pub struct ReportPipeline {
    registry: Arc<EndpointRegistry>,
    client: ReportApiClient,
    cache: CacheStore,
}

impl ReportPipeline {
    pub fn new(registry: Arc<EndpointRegistry>, client: ReportApiClient, cache: CacheStore) -> Self {
        Self {
            registry,
            client,
            cache,
        }
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Handles `GET /wrapper/{endpoint_key}?{query}`.
    pub async fn run(&self, endpoint_key: &str, mut query: Params) -> Result<WrapperOutput, AppError> {
        let flags = RequestFlags::extract(&mut query)?;
        let endpoint = self.registry.resolve(endpoint_key)?;
        let params = merge_params(&endpoint.default_params, &query);

        tracing::info!(
            "Wrapper call: endpoint={} view={:?} compare={}",
            endpoint_key,
            flags.view,
            flags.compare_previous
        );

        let raw = self
            .client
            .fetch_json(&endpoint.path, &params)
            .await
            .with_context(|| format!("fetching {}", endpoint_key))?;
        let optimized = optimize(&raw);
        self.persist_pair(endpoint_key, &params, &raw, &optimized).await;

        let mut dashboard = build_dashboard_payload(&optimized);
        if flags.compare_previous && flags.view == View::Dashboard {
            dashboard = match self
                .previous_period(endpoint_key, &endpoint, &params, &dashboard.overview)
                .await
            {
                Ok(comparison) => dashboard.with_comparison(comparison),
                Err(e) => {
                    tracing::warn!("Previous-month comparison unavailable for {}: {}", endpoint_key, e);
                    dashboard.with_comparison_unavailable(e.to_string())
                }
            };
        }
        if let Err(e) = self
            .cache
            .write_json(endpoint_key, &params, Artifact::Dashboard, &dashboard)
            .await
        {
            tracing::warn!("Failed to cache dashboard for {}: {}", endpoint_key, e);
        }
        if let Err(e) =
            write_comparison_report(&self.cache, endpoint_key, &params, &raw, &optimized).await
        {
            tracing::warn!("Failed to write comparison report for {}: {}", endpoint_key, e);
        }

        Ok(match flags.view {
            View::Raw => WrapperOutput::Raw(raw),
            View::Optimized => WrapperOutput::Optimized(optimized),
            View::Dashboard => WrapperOutput::Dashboard(dashboard),
        })
    }

    /// One-shot fetch for the command line: resolve, fetch, cache the raw
    /// document, optimize. Reserved flags are not interpreted here.
    pub async fn fetch_optimized(
        &self,
        endpoint_key: &str,
        query: Params,
        save_optimized: bool,
    ) -> Result<Value, AppError> {
        let endpoint = self.registry.resolve(endpoint_key)?;
        let params = merge_params(&endpoint.default_params, &query);

        let raw = self
            .client
            .fetch_json(&endpoint.path, &params)
            .await
            .with_context(|| format!("fetching {}", endpoint_key))?;
        self.persist(endpoint_key, &params, Artifact::Raw, &raw).await;

        let optimized = optimize(&raw);
        if save_optimized {
            self.persist(endpoint_key, &params, Artifact::Optimized, &optimized)
                .await;
        }
        Ok(optimized)
    }

    async fn persist_pair(&self, endpoint_key: &str, params: &Params, raw: &Value, optimized: &Value) {
        self.persist(endpoint_key, params, Artifact::Raw, raw).await;
        self.persist(endpoint_key, params, Artifact::Optimized, optimized)
            .await;
    }

    async fn persist(&self, endpoint_key: &str, params: &Params, artifact: Artifact, doc: &Value) {
        if let Err(e) = self.cache.write_json(endpoint_key, params, artifact, doc).await {
            tracing::warn!("Failed to cache {:?} for {}: {}", artifact, endpoint_key, e);
        }
    }

    /// Fetches the calendar month before the request period and compares it
    /// with the current overview.
    async fn previous_period(
        &self,
        endpoint_key: &str,
        endpoint: &EndpointConfig,
        params: &Params,
        current: &OverviewMetrics,
    ) -> Result<PeriodComparison, AppError> {
        let (from, to) = previous_month_range(period_anchor(params));
        let mut previous_params = params.clone();
        previous_params.insert("from".to_string(), from.format("%Y-%m-%d").to_string());
        previous_params.insert("to".to_string(), to.format("%Y-%m-%d").to_string());

        let raw = self
            .client
            .fetch_json(&endpoint.path, &previous_params)
            .await
            .with_context(|| format!("fetching previous month {} to {}", from, to))?;
        let optimized = optimize(&raw);
        self.persist_pair(endpoint_key, &previous_params, &raw, &optimized)
            .await;

        let previous = build_overview(&optimized);
        Ok(PeriodComparison {
            from,
            to,
            deltas: compare_periods(current, &previous),
            previous,
        })
    }
}

/// Date whose month is "current": the request's `from`, or today.
pub fn period_anchor(params: &Params) -> NaiveDate {
    params
        .get("from")
        .and_then(|from| parse_timestamp(&Value::String(from.clone())))
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| Utc::now().date_naive())
}
