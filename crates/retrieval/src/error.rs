use geolocation::GeolocationError;
use netcdf_parser::NetCdfError;
use sampler_common::ConfigError;
use thiserror::Error;

pub type RetrievalResult<T> = Result<T, RetrievalError>;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The archive answered with its login page instead of the file.
    #[error("Earthdata login required for {0}")]
    Unauthorized(String),

    #[error("No granules for {mission} within {window}")]
    NotFound { mission: String, window: String },

    #[error("Granule rank {rank} requested but only {available} available")]
    RankUnavailable { rank: usize, available: usize },

    #[error("Malformed catalog response: {0}")]
    Catalog(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("Dataset error: {0}")]
    Dataset(#[from] NetCdfError),

    #[error("Geolocation error: {0}")]
    Geolocation(#[from] GeolocationError),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RetrievalError {
    /// Network failures worth another attempt. Status codes are final.
    pub fn is_transient(&self) -> bool {
        match self {
            RetrievalError::Transport(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            _ => false,
        }
    }

    /// Errors that must not degrade to a sentinel value.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RetrievalError::Dataset(NetCdfError::DummyUnavailable { .. })
                | RetrievalError::Config(_)
        )
    }
}
