//! Geographic bounding boxes in degrees.

use serde::{Deserialize, Serialize};

/// A longitude/latitude bounding box.
///
/// `min_x`/`max_x` are the west/east longitudes, `min_y`/`max_y` the
/// south/north latitudes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Box of `half_width` degrees on each side of a point.
    pub fn around(lon: f64, lat: f64, half_width: f64) -> Self {
        Self::new(
            lon - half_width,
            lat - half_width,
            lon + half_width,
            lat + half_width,
        )
    }

    /// Smallest box enclosing a polygon's `(lon, lat)` vertices.
    ///
    /// Returns `None` for an empty vertex list.
    pub fn from_vertices<I>(vertices: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = vertices.into_iter();
        let (lon, lat) = iter.next()?;
        let mut bbox = Self::new(lon, lat, lon, lat);
        for (lon, lat) in iter {
            bbox.min_x = bbox.min_x.min(lon);
            bbox.max_x = bbox.max_x.max(lon);
            bbox.min_y = bbox.min_y.min(lat);
            bbox.max_y = bbox.max_y.max(lat);
        }
        Some(bbox)
    }

    /// Width of the bounding box in degrees.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in degrees.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// True unless one of the four edges lies closer than `padding` degrees
    /// to the point. Each edge is measured along its own axis.
    pub fn clear_of_edges(&self, lon: f64, lat: f64, padding: f64) -> bool {
        [
            (self.max_x - lon).abs(),
            (self.min_x - lon).abs(),
            (self.max_y - lat).abs(),
            (self.min_y - lat).abs(),
        ]
        .iter()
        .all(|distance| *distance >= padding)
    }
}
