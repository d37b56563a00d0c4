//! Mission descriptors and the archive access strategies they select.

use chrono::{Datelike, NaiveDate};

/// Longitude convention expected by an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LonConvention {
    /// [-180, 180)
    Signed,
    /// [0, 360)
    Positive,
}

impl LonConvention {
    pub fn normalize(self, lon: f64) -> f64 {
        match self {
            LonConvention::Positive => lon.rem_euclid(360.0),
            LonConvention::Signed => {
                let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
                // 180 itself is a legal input and must not flip sign
                if lon == 180.0 {
                    lon
                } else {
                    wrapped
                }
            }
        }
    }
}

/// Unit conversion applied to sampled values before output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTransform {
    KelvinToCelsius,
}

impl ValueTransform {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            ValueTransform::KelvinToCelsius => value - 273.15,
        }
    }
}

/// How pixels of a mission's files are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLayout {
    /// Level-2 swath: geophysical and navigation groups, companion
    /// latitude/longitude arrays, an `l2_flags` quality array.
    Swath,
    /// Regular lat/lon grid with `lat`/`lon` coordinate variables.
    Grid,
    /// GMT grid whose coordinates are named `x`/`y`.
    ProjectedGrid,
}

/// A URL with `{yyyy}`, `{yyyymm}`, `{yyyymmdd}` date placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlTemplate(pub &'static str);

impl UrlTemplate {
    pub fn render(&self, date: NaiveDate) -> String {
        self.0
            .replace("{yyyymmdd}", &date.format("%Y%m%d").to_string())
            .replace("{yyyymm}", &date.format("%Y%m").to_string())
            .replace("{yyyy}", &format!("{:04}", date.year()))
    }
}

/// Archive access strategy, one per mission.
#[derive(Debug, Clone, PartialEq)]
pub enum Archive {
    /// Granule catalog search followed by an authenticated download.
    MetadataSearch {
        short_name: &'static str,
        revisit_hours: i64,
        exclude: &'static [&'static str],
    },
    /// Remote NetCDF subsetting service.
    Subsetting {
        url: UrlTemplate,
        lon_convention: LonConvention,
    },
    /// Per-day directory listing, geolocating each candidate in turn.
    OrbitSearch { exclude: &'static [&'static str] },
    /// A fixed file in the dataset directory.
    StaticLocal { file_name: &'static str },
}

impl Archive {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Archive::MetadataSearch { .. } => "metadata_search",
            Archive::Subsetting { .. } => "subsetting",
            Archive::OrbitSearch { .. } => "orbit_search",
            Archive::StaticLocal { .. } => "static_local",
        }
    }
}

/// Inclusive range of dates a mission has data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateCoverage {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateCoverage {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Immutable description of one mission.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionDescriptor {
    pub name: &'static str,
    pub variables: &'static [&'static str],
    pub coverage: DateCoverage,
    pub layout: DataLayout,
    pub archive: Archive,
    pub transform: Option<ValueTransform>,
    /// File name of the stand-in dataset in the dataset directory.
    pub dummy_dataset: &'static str,
}

impl MissionDescriptor {
    pub fn is_georeferenced(&self) -> bool {
        self.layout != DataLayout::Swath
    }

    pub fn needs_orbit_search(&self) -> bool {
        matches!(self.archive, Archive::OrbitSearch { .. })
    }

    pub fn needs_value_transform(&self) -> bool {
        self.transform.is_some()
    }

    pub fn has_variable(&self, variable: &str) -> bool {
        self.variables.contains(&variable)
    }
}
