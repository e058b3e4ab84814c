use crate::endpoints::Params;
use crate::errors::AppError;
use serde_json::Value;
use std::time::Duration;

/// Client for the upstream report API.
///
/// Every call carries the `X-API-Key` credential and a bounded timeout. Failures
/// surface immediately; nothing is retried.
#[derive(Clone)]
pub struct ReportApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ReportApiClient {
    /// Creates a new `ReportApiClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the upstream API, without trailing slash.
    /// * `api_key` - Optional credential attached as `X-API-Key`.
    /// * `timeout` - Upper bound for a whole request.
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create report client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Fetches the JSON document at `path` with the given query parameters.
    ///
    /// # Returns
    ///
    /// * `Result<Value, AppError>` - The parsed response body, or `ExternalApiError`
    ///   on transport failure, non-success status, or an unparseable body.
    pub async fn fetch_json(&self, path: &str, params: &Params) -> Result<Value, AppError> {
        // Build URL with proper parameter encoding
        let url = reqwest::Url::parse_with_params(
            &format!("{}/{}", self.base_url, path.trim_start_matches('/')),
            params.iter(),
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Fetching report from upstream: {}", path);
        tracing::debug!("Upstream params: {:?}", params);

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(ref key) = self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Upstream request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Upstream returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Upstream returned {}: {}",
                status, error_text
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse upstream response: {}", e))
        })?;

        tracing::info!(
            "✓ Upstream report fetched ({} record(s))",
            data.get("data")
                .and_then(serde_json::Value::as_array)
                .map(Vec::len)
                .unwrap_or(0)
        );
        Ok(data)
    }
}
