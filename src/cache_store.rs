//! On-disk cache of report artifacts.
//!
//! One folder per endpoint, one file per artifact kind and parameter set:
//! `raw_<suffix>.json`, `optimized_<suffix>.json`, `dashboard_<suffix>.json` and
//! `comparison_<suffix>.{md,html,json}`. Every write replaces the whole file.

use crate::endpoints::{endpoint_slug, Params};
use crate::errors::{AppError, ResultExt};
use moka::future::Cache;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex;

/// Parameters that name a cache slot, in suffix order.
const SUFFIX_PARAMS: &[&str] = &["from", "to", "agentId"];
const SUFFIX_VALUE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Raw,
    Optimized,
    Dashboard,
    ComparisonMarkdown,
    ComparisonHtml,
    ComparisonMetrics,
}

impl Artifact {
    pub fn file_name(self, suffix: &str) -> String {
        match self {
            Artifact::Raw => format!("raw_{}.json", suffix),
            Artifact::Optimized => format!("optimized_{}.json", suffix),
            Artifact::Dashboard => format!("dashboard_{}.json", suffix),
            Artifact::ComparisonMarkdown => format!("comparison_{}.md", suffix),
            Artifact::ComparisonHtml => format!("comparison_{}.html", suffix),
            Artifact::ComparisonMetrics => format!("comparison_{}.json", suffix),
        }
    }
}

fn folder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\-.]").expect("valid folder regex"))
}

fn suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\-=.]").expect("valid suffix regex"))
}

/// Folder name for an endpoint key or literal path.
pub fn bucket_name(endpoint_key: &str) -> String {
    let flat = endpoint_key.trim().trim_matches('/').replace('/', "_");
    let name = folder_regex().replace_all(&flat, "_").to_string();
    if name.is_empty() {
        "default".to_string()
    } else {
        name
    }
}

/// File name suffix for a parameter set: `from=.._to=.._agentId=..`, or the
/// endpoint slug when none of those is set.
pub fn artifact_suffix(endpoint_key: &str, params: &Params) -> String {
    let parts: Vec<String> = SUFFIX_PARAMS
        .iter()
        .filter_map(|name| {
            let value = params.get(*name).filter(|v| !v.is_empty())?;
            let value: String = value.chars().take(SUFFIX_VALUE_MAX_CHARS).collect();
            Some(format!("{}={}", name, value))
        })
        .collect();
    let suffix = if parts.is_empty() {
        endpoint_slug(endpoint_key)
    } else {
        parts.join("_")
    };
    suffix_regex().replace_all(&suffix, "_").to_string()
}

/// Writes and reads cache artifacts. Writes to the same file are serialized.
#[derive(Clone)]
pub struct CacheStore {
    root: PathBuf,
    write_locks: Cache<PathBuf, Arc<Mutex<()>>>,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let write_locks = Cache::builder()
            .time_to_idle(Duration::from_secs(600))
            .max_capacity(10_000)
            .build();
        Self {
            root: root.into(),
            write_locks,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bucket_dir(&self, endpoint_key: &str) -> PathBuf {
        self.root.join(bucket_name(endpoint_key))
    }

    pub fn artifact_path(&self, endpoint_key: &str, params: &Params, artifact: Artifact) -> PathBuf {
        self.bucket_dir(endpoint_key)
            .join(artifact.file_name(&artifact_suffix(endpoint_key, params)))
    }

    /// Pretty-prints `doc` into the artifact slot and returns the file path.
    pub async fn write_json<T: Serialize>(
        &self,
        endpoint_key: &str,
        params: &Params,
        artifact: Artifact,
        doc: &T,
    ) -> Result<PathBuf, AppError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let path = self.artifact_path(endpoint_key, params, artifact);
        self.write_atomic(&path, &bytes).await?;
        Ok(path)
    }

    pub async fn write_text(
        &self,
        endpoint_key: &str,
        params: &Params,
        artifact: Artifact,
        text: &str,
    ) -> Result<PathBuf, AppError> {
        let path = self.artifact_path(endpoint_key, params, artifact);
        self.write_atomic(&path, text.as_bytes()).await?;
        Ok(path)
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), AppError> {
        let lock = self
            .write_locks
            .get_with(path.to_path_buf(), async { Arc::new(Mutex::new(())) })
            .await;
        let _guard = lock.lock().await;

        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating cache folder {}", dir.display()))?;

        // Each write gets its own temp file, so a lost lock entry cannot mix two writers
        let target = path.to_path_buf();
        let contents = bytes.to_vec();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&contents)?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::InternalError(format!("Cache write task failed: {}", e)))?
        .with_context(|| format!("replacing {}", path.display()))?;

        tracing::debug!("Cache artifact written: {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Reads a JSON artifact; `None` when missing or unparseable.
    pub async fn read_json(
        &self,
        endpoint_key: &str,
        params: &Params,
        artifact: Artifact,
    ) -> Option<Value> {
        read_json_file(&self.artifact_path(endpoint_key, params, artifact)).await
    }

    /// Loads the cached raw/optimized pair for a parameter set, or the most
    /// recently written pair in the endpoint folder when `params` is `None`.
    ///
    /// Any missing or malformed file yields `None`.
    pub async fn load_pair(
        &self,
        endpoint_key: &str,
        params: Option<&Params>,
    ) -> Option<(Value, Value)> {
        let (raw_path, opt_path) = match params {
            Some(params) => (
                self.artifact_path(endpoint_key, params, Artifact::Raw),
                self.artifact_path(endpoint_key, params, Artifact::Optimized),
            ),
            None => self.latest_pair_paths(endpoint_key).await?,
        };
        let raw = read_json_file(&raw_path).await?;
        let optimized = read_json_file(&opt_path).await?;
        Some((raw, optimized))
    }

    async fn latest_pair_paths(&self, endpoint_key: &str) -> Option<(PathBuf, PathBuf)> {
        let dir = self.bucket_dir(endpoint_key);
        let mut entries = tokio::fs::read_dir(&dir).await.ok()?;

        let mut raws = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(suffix) = name
                .strip_prefix("raw_")
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };
            let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
                continue;
            };
            raws.push((modified, suffix.to_string(), entry.path()));
        }
        raws.sort_by(|a, b| b.0.cmp(&a.0));

        raws.into_iter().find_map(|(_, suffix, raw_path)| {
            let opt_path = dir.join(Artifact::Optimized.file_name(&suffix));
            opt_path.exists().then_some((raw_path, opt_path))
        })
    }
}

async fn read_json_file(path: &Path) -> Option<Value> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("Cache artifact {} unavailable: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Cache artifact {} is not valid JSON: {}", path.display(), e);
            None
        }
    }
}
