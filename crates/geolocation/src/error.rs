use thiserror::Error;

pub type GeolocationResult<T> = Result<T, GeolocationError>;

#[derive(Debug, Error)]
pub enum GeolocationError {
    #[error("Dataset error: {0}")]
    Dataset(#[from] netcdf_parser::NetCdfError),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Every pixel is masked or has no coordinates.
    #[error("No valid pixel in raster of shape {0:?}")]
    AllMasked(Vec<usize>),
}
