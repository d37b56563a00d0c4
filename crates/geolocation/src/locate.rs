//! Masked nearest-pixel search.

use netcdf_parser::Dataset;
use tracing::debug;

use crate::error::{GeolocationError, GeolocationResult};
use crate::flags::FlagMask;

/// Name of the per-pixel quality flag array in swath files.
pub const FLAGS_VARIABLE: &str = "l2_flags";

/// Patience window in degrees for single lookups.
pub const DEFAULT_PATIENCE: f64 = 0.5;

/// Patience window in degrees used when aggregating many observations.
pub const PIPELINE_PATIENCE: f64 = 0.2;

/// Index reported on both axes when no pixel is close enough.
pub const NO_MATCH_INDEX: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelIndex {
    pub row: usize,
    pub col: usize,
}

/// Outcome of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelMatch {
    Found(PixelIndex),
    /// The nearest valid pixel lies outside the patience window. Its index
    /// must never be used for sampling.
    OutOfWindow,
}

impl PixelMatch {
    pub fn index(&self) -> Option<PixelIndex> {
        match self {
            PixelMatch::Found(index) => Some(*index),
            PixelMatch::OutOfWindow => None,
        }
    }

    /// `(row, col)`, or `(-1, -1)` when there is no match.
    pub fn as_signed(&self) -> (i64, i64) {
        match self {
            PixelMatch::Found(index) => (index.row as i64, index.col as i64),
            PixelMatch::OutOfWindow => (NO_MATCH_INDEX, NO_MATCH_INDEX),
        }
    }
}

/// Finds the nearest unmasked pixel to a target location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Locator {
    pub mask: FlagMask,
    pub patience: f64,
}

impl Default for Locator {
    fn default() -> Self {
        Self {
            mask: FlagMask::Land,
            patience: DEFAULT_PATIENCE,
        }
    }
}

impl Locator {
    pub fn new(mask: FlagMask, patience: f64) -> Self {
        Self { mask, patience }
    }

    /// Locate `(lat, lon)` in a swath dataset.
    ///
    /// Pixels whose `l2_flags` intersect the mask, or whose coordinates are
    /// NaN, are ignored. The minimum of `(lat_grid - lat)^2 + (lon_grid - lon)^2`
    /// over the remaining pixels is the candidate; it is returned only if it
    /// lies within the patience window on both axes.
    pub fn locate(&self, dataset: &Dataset, lat: f64, lon: f64) -> GeolocationResult<PixelMatch> {
        let lats = &dataset.latitude()?.values;
        let lons = &dataset.longitude()?.values;

        if lats.ndim() != 2 || lats.shape() != lons.shape() {
            return Err(GeolocationError::ShapeMismatch(format!(
                "latitude {:?} and longitude {:?} must be equal 2-D arrays",
                lats.shape(),
                lons.shape()
            )));
        }

        let flags = match dataset.variable(FLAGS_VARIABLE) {
            Some(flags) if flags.shape() == lats.shape() => Some(&flags.values),
            Some(flags) => {
                return Err(GeolocationError::ShapeMismatch(format!(
                    "{} {:?} does not match coordinates {:?}",
                    FLAGS_VARIABLE,
                    flags.shape(),
                    lats.shape()
                )))
            }
            None => {
                debug!(source = %dataset.source().display(), "No quality flags, all pixels valid");
                None
            }
        };
        let mut flag_iter = flags.map(|f| f.iter());

        let mut best: Option<(usize, f64, f64, f64)> = None;
        for (i, (&plat, &plon)) in lats.iter().zip(lons.iter()).enumerate() {
            let flag = flag_iter.as_mut().and_then(Iterator::next).copied();
            if flag.is_some_and(|f| self.mask.rejects(f)) {
                continue;
            }
            let distance = (plat - lat).powi(2) + (plon - lon).powi(2);
            if distance.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, d, _, _)| distance < d) {
                best = Some((i, distance, plat, plon));
            }
        }

        let (flat, _, found_lat, found_lon) = best.ok_or_else(|| GeolocationError::AllMasked(lats.shape().to_vec()))?;
        let cols = lats.shape()[1];
        let index = PixelIndex {
            row: flat / cols,
            col: flat % cols,
        };

        let within = (found_lat - lat).abs() <= self.patience
            && (found_lon - lon).abs() <= self.patience;

        debug!(
            lat,
            lon,
            found_lat,
            found_lon,
            within,
            "Located nearest valid pixel"
        );

        Ok(if within {
            PixelMatch::Found(index)
        } else {
            PixelMatch::OutOfWindow
        })
    }
}
