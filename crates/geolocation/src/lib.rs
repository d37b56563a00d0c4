//! Nearest valid pixel search for index-addressed (swath) rasters.
//!
//! Swath pixels are located through companion latitude/longitude arrays.
//! Pixels whose quality flags intersect the selected [`FlagMask`] are never
//! matched. A match further than the patience window from the target on
//! either axis is reported as [`PixelMatch::OutOfWindow`].

pub mod error;
pub mod flags;
pub mod locate;

pub use error::{GeolocationError, GeolocationResult};
pub use flags::FlagMask;
pub use locate::{
    Locator, PixelIndex, PixelMatch, DEFAULT_PATIENCE, FLAGS_VARIABLE, NO_MATCH_INDEX,
    PIPELINE_PATIENCE,
};
