use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::interceptor::boundary::DEFAULT_FALLBACK_MESSAGE;
use crate::interceptor::canonicalize::{Placeholders, DEFAULT_MAX_DEPTH, MAX_DEPTH_LIMIT};
use crate::interceptor::memo::DEFAULT_MEMO_CAPACITY;
use crate::monitoring::mutation_watcher::WatcherConfig;

pub const CONFIG_ENV_VAR: &str = "CONTENTGUARD_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),
    #[error("Failed to parse config JSON: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub fallback_message: String,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
        }
    }
}

/// Process-wide pipeline settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub placeholders: Placeholders,
    pub max_depth: usize,
    pub memo_capacity: usize,
    /// Install the runtime interception layer during bootstrap.
    pub intercept_runtime: bool,
    pub boundary: BoundaryConfig,
    pub watcher: WatcherConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            placeholders: Placeholders::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            memo_capacity: DEFAULT_MEMO_CAPACITY,
            intercept_runtime: true,
            boundary: BoundaryConfig::default(),
            watcher: WatcherConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_depth must be at most {MAX_DEPTH_LIMIT}, got {}",
                self.max_depth
            )));
        }
        if self.memo_capacity == 0 {
            return Err(ConfigError::Invalid("memo_capacity must be at least 1".into()));
        }
        if self.watcher.marker_class.trim().is_empty() {
            return Err(ConfigError::Invalid("watcher.marker_class is empty".into()));
        }
        if self.boundary.fallback_message.trim().is_empty() {
            return Err(ConfigError::Invalid("boundary.fallback_message is empty".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &str) -> Result<PipelineConfig, ConfigError> {
    if !Path::new(path).exists() {
        return Err(ConfigError::FileNotFound(path.to_string()));
    }

    let raw_json = fs::read_to_string(path)?;
    let config: PipelineConfig =
        serde_json::from_str(&raw_json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;

    Ok(config)
}

/// Loads from the file named by `CONTENTGUARD_CONFIG`, or defaults if unset.
pub fn load_from_env() -> Result<PipelineConfig, ConfigError> {
    match env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => load_config(&path),
        _ => Ok(PipelineConfig::default()),
    }
}
