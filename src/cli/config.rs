use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::Deserialize;

use crate::engine::types::RetryCaps;

/// Configuration loaded from `quester.yaml`.
/// All fields are optional — missing fields fall back to CLI/env/defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub store_path: Option<String>,
    /// Worker name → tool endpoint URL.
    pub worker_endpoints: Option<HashMap<String, String>>,
    pub default_tool_timeout_ms: Option<u64>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RetryConfig {
    pub max_tries_cap: Option<u32>,
    pub wait_ms_cap: Option<u64>,
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// - If `path` is `Some`, load that specific file (error if missing).
    /// - If `path` is `None`, auto-detect `quester.yaml` in cwd; return defaults if absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_path = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                p.to_path_buf()
            }
            None => {
                let default_path = Path::new("quester.yaml");
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path.to_path_buf()
            }
        };

        let contents = std::fs::read_to_string(&file_path).with_context(|| format!("Failed to read config file: {}", file_path.display()))?;

        let config: EngineConfig =
            serde_yml::from_str(&contents).with_context(|| format!("Failed to parse config file: {}", file_path.display()))?;

        Ok(config)
    }

    pub fn store_path(&self) -> &str {
        self.store_path.as_deref().unwrap_or("quester.db")
    }

    pub fn default_tool_timeout_ms(&self) -> u64 {
        self.default_tool_timeout_ms.unwrap_or(30_000)
    }

    pub fn retry_caps(&self) -> RetryCaps {
        let mut caps = RetryCaps::default();
        if let Some(retry) = &self.retry {
            if let Some(max_tries_cap) = retry.max_tries_cap {
                caps.max_tries_cap = max_tries_cap;
            }
            if let Some(wait_ms_cap) = retry.wait_ms_cap {
                caps.max_wait_ms_cap = wait_ms_cap;
            }
        }
        caps
    }

    pub fn worker_endpoints(&self) -> HashMap<String, String> {
        self.worker_endpoints.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = EngineConfig::load(Some(Path::new("/nonexistent/quester.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn defaults_apply_when_file_absent() {
        let config = EngineConfig::default();
        assert_eq!(config.store_path(), "quester.db");
        assert_eq!(config.default_tool_timeout_ms(), 30_000);
        assert_eq!(config.retry_caps().max_tries_cap, 5);
    }
}
