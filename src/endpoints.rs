//! Endpoint registry: maps a logical endpoint key to the upstream path plus the
//! fixed parameters the backend adds on every call (agentId, by, messageHistory...).
//!
//! The registry file is a JSON object whose values are either a plain path
//! string or `{"path": "...", "default_params": {...}}`. Default values written
//! as `${VAR}` are resolved from the environment once, at load time.

use crate::errors::AppError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Flat, string-keyed parameter set forwarded to the upstream API.
pub type Params = BTreeMap<String, String>;

/// Short artifact names for known endpoints.
const ENDPOINT_SLUGS: &[(&str, &str)] = &[("report_lia", "liareport")];

/// A resolved endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    /// Upstream path relative to the base URL, without a leading slash.
    pub path: String,
    pub default_params: Params,
}

#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: BTreeMap<String, EndpointConfig>,
}

impl EndpointRegistry {
    /// Loads the registry file, resolving placeholders from the process environment.
    ///
    /// A missing file yields an empty registry (literal paths still resolve).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "Endpoints file {} not found, registry is empty",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid JSON in {}: {}", path.display(), e))?;
        let registry = Self::from_value(&value, |var| std::env::var(var).ok())?;
        tracing::info!(
            "Loaded {} endpoint(s) from {}: {:?}",
            registry.endpoints.len(),
            path.display(),
            registry.keys()
        );
        Ok(registry)
    }

    /// Builds a registry from its JSON form. `lookup` resolves `${VAR}` placeholders;
    /// an unresolved variable becomes an empty string.
    pub fn from_value<F>(value: &Value, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(entries) = value.as_object() else {
            anyhow::bail!("Endpoints file must contain a JSON object");
        };

        let mut endpoints = BTreeMap::new();
        for (key, entry) in entries {
            let config = match entry {
                Value::String(path) => EndpointConfig {
                    path: path.trim_start_matches('/').to_string(),
                    default_params: Params::new(),
                },
                Value::Object(obj) => {
                    let Some(path) = obj.get("path").and_then(Value::as_str) else {
                        tracing::warn!("Endpoint '{}' has no path, skipping", key);
                        continue;
                    };
                    let mut default_params = Params::new();
                    if let Some(defaults) = obj.get("default_params").and_then(Value::as_object) {
                        for (name, raw) in defaults {
                            default_params.insert(name.clone(), resolve_default(raw, &lookup));
                        }
                    }
                    EndpointConfig {
                        path: path.trim_start_matches('/').to_string(),
                        default_params,
                    }
                }
                _ => {
                    tracing::warn!("Endpoint '{}' is neither a path nor an object, skipping", key);
                    continue;
                }
            };
            endpoints.insert(key.clone(), config);
        }

        Ok(Self { endpoints })
    }

    /// Resolves a key (or a literal path containing `/`) to its endpoint config.
    pub fn resolve(&self, key: &str) -> Result<EndpointConfig, AppError> {
        if key.contains('/') {
            return Ok(EndpointConfig {
                path: key.trim_start_matches('/').to_string(),
                default_params: Params::new(),
            });
        }
        self.endpoints
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::UnknownEndpoint {
                key: key.to_string(),
                available: self.keys(),
            })
    }

    pub fn keys(&self) -> Vec<String> {
        self.endpoints.keys().cloned().collect()
    }
}

fn resolve_default<F>(raw: &Value, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match raw {
        Value::String(s) if s.starts_with("${") && s.ends_with('}') && s.len() >= 3 => {
            let var = s[2..s.len() - 1].trim();
            lookup(var).unwrap_or_default()
        }
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Query parameters override the endpoint's defaults.
pub fn merge_params(defaults: &Params, query: &Params) -> Params {
    let mut merged = defaults.clone();
    for (k, v) in query {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Short name used in cache artifact file names (`report_lia` -> `liareport`).
pub fn endpoint_slug(key: &str) -> String {
    if let Some((_, slug)) = ENDPOINT_SLUGS.iter().find(|(k, _)| *k == key) {
        return slug.to_string();
    }
    if key.contains('/') {
        return "default".to_string();
    }
    let slug = key.replace('-', "_").trim().to_string();
    if slug.is_empty() {
        "default".to_string()
    } else {
        slug
    }
}
