//! Error types shared by every stage of the sampler.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Caller mistakes. These are raised immediately and never recovered.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    // === Request Errors ===
    #[error("Invalid mission: {mission}. Valid missions: {valid}")]
    UnknownMission { mission: String, valid: String },

    #[error("Invalid variable '{variable}' for mission {mission}")]
    UnknownVariable { mission: String, variable: String },

    #[error("Malformed mission request '{0}', expected Mission:variable")]
    MalformedRequest(String),

    #[error("Unknown quality flag mask: {0}")]
    UnknownFlagMask(String),

    // === Registry Errors ===
    #[error("Invalid mission registry: {0}")]
    InvalidRegistry(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Expected data-availability conditions.
///
/// A warning is a value, never an `Err`: the observation it concerns degrades
/// to sentinel output and processing continues.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RangeWarning {
    #[error("Invalid date: {date} for {mission}. Valid dates: {start} to {end}")]
    DateOutOfRange {
        mission: String,
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Invalid longitude: {0}. Valid longitude: [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("Invalid latitude: {0}. Valid latitude: [-90, 90]")]
    LatitudeOutOfRange(f64),
}

/// An input row whose group key cannot be interpreted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ObservationError {
    #[error("Invalid time of day: '{0}'")]
    InvalidTime(String),

    #[error("Invalid date: '{0}'")]
    InvalidDate(String),

    #[error("Invalid coordinate: '{0}'")]
    InvalidCoordinate(String),
}
