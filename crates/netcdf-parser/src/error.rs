//! Error types for NetCDF loading and sampling.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for NetCDF parser operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF parsing.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The library refused to open the file
    #[error("Failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },

    /// A swath file is missing one of its groups
    #[error("Group '{group}' not found in {path}")]
    MissingGroup { path: PathBuf, group: String },

    /// Missing required variable or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Index {index:?} out of bounds for variable '{variable}' with shape {shape:?}")]
    IndexOutOfBounds {
        variable: String,
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    /// The stand-in dataset itself could not be opened
    #[error("Dummy dataset for {mission} unavailable at {path}: {source}")]
    DummyUnavailable {
        mission: String,
        path: PathBuf,
        #[source]
        source: Box<NetCdfError>,
    },
}
