//! NetCDF dataset loading for ocean-colour and sea-surface products.
//!
//! Files are read into an in-memory [`Dataset`] of named n-dimensional
//! variables, so a handle never outlives the file it came from and
//! temporary downloads can be removed right after opening. A [`Selection`]
//! keeps the read to the requested variables, and for grids to the cells
//! around the query point.
//!
//! # Layouts
//!
//! - Level-2 swath files split `navigation_data` (latitude, longitude) and
//!   `geophysical_data` (products, `l2_flags`) into groups. Both groups are
//!   merged into one flat dataset.
//! - Gridded products expose `lat`/`lon` coordinate variables.
//! - GMT grids name their axes `x`/`y`; these are renamed to `lon`/`lat`.
//!
//! When a file cannot be opened, [`DatasetLoader`] substitutes the mission's
//! stand-in dataset and reports the original error alongside it.

pub mod dataset;
pub mod error;
pub mod loader;
pub mod native;

pub use dataset::{Dataset, Variable};
pub use error::{NetCdfError, NetCdfResult};
pub use loader::{DatasetLoader, Loaded, SourceFile};
pub use native::{
    read_dataset, silence_hdf5_errors, Selection, GEOPHYSICAL_GROUP, NAVIGATION_GROUP,
};
