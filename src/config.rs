use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, built once at startup and passed to the components that need it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the upstream report API (no trailing slash).
    pub base_url: String,
    pub port: u16,
    /// Credential sent as `X-API-Key` on every upstream call.
    pub api_key: Option<String>,
    pub cache_dir: PathBuf,
    pub endpoints_file: PathBuf,
    pub upstream_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            base_url: normalize_base_url(
                &std::env::var("WRAPPER_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            )?,
            port: std::env::var("WRAPPER_PORT")
                .or_else(|_| std::env::var("PORT"))
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WRAPPER_PORT must be a valid number between 1-65535"))?,
            api_key: std::env::var("GENERAL_REPORT_API_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            cache_dir: std::env::var("WRAPPER_CACHE_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cache")),
            endpoints_file: std::env::var("ENDPOINTS_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/api_endpoints.json")),
            upstream_timeout_secs: std::env::var("UPSTREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("UPSTREAM_TIMEOUT_SECS must be a positive integer"))
                .and_then(|secs: u64| {
                    if secs == 0 {
                        anyhow::bail!("UPSTREAM_TIMEOUT_SECS cannot be zero");
                    }
                    Ok(secs)
                })?,
        };

        // Never log the API key itself
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Upstream base URL: {}", config.base_url);
        tracing::debug!("Cache dir: {}", config.cache_dir.display());
        tracing::debug!("Endpoints file: {}", config.endpoints_file.display());
        tracing::debug!("Server Port: {}", config.port);
        if config.api_key.is_none() {
            tracing::warn!("GENERAL_REPORT_API_KEY not set, upstream calls go out without X-API-Key");
        }

        Ok(config)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// Validates the upstream base URL and rewrites `0.0.0.0` (a bind address, not a
/// reachable host) to `localhost`.
pub fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        anyhow::bail!("WRAPPER_BASE_URL cannot be empty");
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        anyhow::bail!("WRAPPER_BASE_URL must start with http:// or https://");
    }
    let rewritten = trimmed.replace("0.0.0.0", "localhost");
    url::Url::parse(&rewritten)
        .map_err(|e| anyhow::anyhow!("WRAPPER_BASE_URL is not a valid URL: {}", e))?;
    Ok(rewritten)
}
