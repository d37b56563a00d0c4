//! Run configuration.
//!
//! Loaded from an optional YAML file with `${VAR}` and `${VAR:-default}`
//! environment substitution. Every field has a default, so an empty file
//! is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use geolocation::{FlagMask, Locator, PIPELINE_PATIENCE};
use netcdf_parser::DatasetLoader;
use retrieval::{
    ArchiveClient, ArchiveRetriever, ClientConfig, Credentials, RetrieverConfig, RetryPolicy,
};
use sampler_common::{ConfigError, Sentinels};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_MAX_CONCURRENT_KEYS: usize = 4;
pub const DEFAULT_DUMMY_DIR: &str = "/usr/local/nepac/model/datasets";

/// How group keys are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One key at a time, one mission at a time.
    #[default]
    Sequential,
    /// Missions of a key run as concurrent tasks joined by a merge step;
    /// several keys are in flight at once.
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Group keys processed per chunk before output is appended.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(flatten)]
    pub sentinels: Sentinels,

    /// Maximum distance in degrees between a query and its located pixel.
    #[serde(default = "default_patience")]
    pub patience_degrees: f64,

    #[serde(default)]
    pub flag_mask: FlagMask,

    #[serde(default)]
    pub mode: ExecutionMode,

    /// Keys in flight at once in parallel mode.
    #[serde(default = "default_max_concurrent_keys")]
    pub max_concurrent_keys: usize,

    /// Directory holding the missions' dummy datasets and static files.
    #[serde(default = "default_dummy_dir")]
    pub dummy_dir: PathBuf,

    /// Directory for temporary downloads. Defaults to a fresh
    /// subdirectory of the system temporary directory.
    #[serde(default = "retrieval::run_work_dir")]
    pub work_dir: PathBuf,

    /// Persistent granule cache.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_day_night")]
    pub day_night: Option<String>,

    /// Which ranked catalog hit to download.
    #[serde(default)]
    pub granule_rank: usize,

    #[serde(default = "RetryPolicy::tasks")]
    pub task_retry: RetryPolicy,

    #[serde(default = "RetryPolicy::downloads")]
    pub download_retry: RetryPolicy,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_patience() -> f64 {
    PIPELINE_PATIENCE
}

fn default_max_concurrent_keys() -> usize {
    DEFAULT_MAX_CONCURRENT_KEYS
}

fn default_dummy_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DUMMY_DIR)
}

fn default_day_night() -> Option<String> {
    Some("day".to_string())
}

fn default_request_timeout_secs() -> u64 {
    600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            sentinels: Sentinels::default(),
            patience_degrees: PIPELINE_PATIENCE,
            flag_mask: FlagMask::default(),
            mode: ExecutionMode::default(),
            max_concurrent_keys: DEFAULT_MAX_CONCURRENT_KEYS,
            dummy_dir: default_dummy_dir(),
            work_dir: retrieval::run_work_dir(),
            cache_dir: None,
            day_night: default_day_night(),
            granule_rank: 0,
            task_retry: RetryPolicy::tasks(),
            download_retry: RetryPolicy::downloads(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a YAML configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::Invalid(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> PipelineResult<Self> {
        let expanded = expand_env_vars(content)?;
        let config: PipelineConfig = if expanded.trim().is_empty() {
            PipelineConfig::default()
        } else {
            serde_yaml::from_str(&expanded)
                .map_err(|e| ConfigError::Invalid(format!("invalid YAML: {}", e)))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size must be greater than 0"));
        }
        if self.max_concurrent_keys == 0 {
            return Err(invalid("max_concurrent_keys must be greater than 0"));
        }
        if self.patience_degrees.is_nan() || self.patience_degrees <= 0.0 {
            return Err(invalid("patience_degrees must be positive"));
        }
        if self.sentinels.no_data == self.sentinels.errored {
            return Err(invalid("no_data and errored sentinels must differ"));
        }
        Ok(())
    }

    pub fn locator(&self) -> Locator {
        Locator::new(self.flag_mask, self.patience_degrees)
    }

    pub fn client_config(&self, credentials: Option<Credentials>) -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry: self.download_retry,
            credentials,
            ..Default::default()
        }
    }

    pub fn retriever_config(&self) -> RetrieverConfig {
        RetrieverConfig {
            work_dir: self.work_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            day_night: self.day_night.clone(),
            rank: self.granule_rank,
            ..Default::default()
        }
    }

    /// Build the archive retriever with one shared HTTP client.
    pub fn archive_retriever(
        &self,
        credentials: Option<Credentials>,
    ) -> PipelineResult<ArchiveRetriever> {
        let client = ArchiveClient::new(self.client_config(credentials))
            .map_err(|e| invalid(&format!("failed to create HTTP client: {}", e)))?;
        Ok(ArchiveRetriever::new(
            Arc::new(client),
            DatasetLoader::new(&self.dummy_dir),
            self.locator(),
            self.retriever_config(),
        ))
    }
}

fn invalid(message: &str) -> PipelineError {
    PipelineError::Config(ConfigError::Invalid(message.to_string()))
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}` and `${VAR:-default}` in YAML content.
fn expand_env_vars(content: &str) -> PipelineResult<String> {
    let mut result = String::new();
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => var_expr.push(c),
                    None => {
                        return Err(invalid(&format!(
                            "unclosed variable substitution: ${{{}",
                            var_expr
                        )))
                    }
                }
            }
            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> PipelineResult<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim())
            .map_err(|_| invalid(&format!("environment variable {} not set", expr)))
    }
}
