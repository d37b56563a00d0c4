use std::path::PathBuf;

use retrieval::RetrievalError;
use sampler_common::ConfigError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read input table {path}: {message}")]
    Input { path: PathBuf, message: String },

    #[error("Failed to write output table {path}: {message}")]
    Output { path: PathBuf, message: String },

    /// A per-mission task kept failing after every retry.
    #[error("Task for {mission} at {key} failed after {attempts} attempts: {source}")]
    TaskExhausted {
        mission: String,
        key: String,
        attempts: u32,
        #[source]
        source: RetrievalError,
    },

    /// Merging a key's per-mission results kept failing.
    #[error("Merging results for {key} failed after {attempts} attempts: {message}")]
    BarrierExhausted {
        key: String,
        attempts: u32,
        message: String,
    },

    #[error("Row for {key} is missing column {column}")]
    IncompleteRow { key: String, column: String },

    #[error("Background task failed: {0}")]
    Join(String),
}

impl PipelineError {
    pub fn input(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        PipelineError::Input {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn output(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        PipelineError::Output {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Failures another attempt could clear. A row missing a column stays
    /// incomplete however often it is merged.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Join(_))
    }
}
