//! Validated, read-only mission registry.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, Utc};
use tracing::warn;

use crate::catalog;
use crate::error::{ConfigError, ConfigResult, RangeWarning};
use crate::mission::MissionDescriptor;

pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);

/// Catalog of known missions keyed by name.
///
/// Built once at process start and shared by reference; never mutated.
#[derive(Debug, Clone)]
pub struct MissionRegistry {
    missions: BTreeMap<&'static str, MissionDescriptor>,
}

impl MissionRegistry {
    /// The standard catalog with open-ended coverage ending today (UTC).
    pub fn standard() -> ConfigResult<Self> {
        Self::standard_as_of(Utc::now().date_naive())
    }

    /// The standard catalog with open-ended coverage ending at `today`.
    pub fn standard_as_of(today: NaiveDate) -> ConfigResult<Self> {
        Self::from_descriptors(catalog::standard_missions(today)?)
    }

    /// Build a registry from arbitrary descriptors, rejecting duplicates,
    /// empty or repeated variable lists, and inverted coverage.
    pub fn from_descriptors<I>(descriptors: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = MissionDescriptor>,
    {
        let mut missions = BTreeMap::new();
        for descriptor in descriptors {
            if descriptor.variables.is_empty() {
                return Err(ConfigError::InvalidRegistry(format!(
                    "{} has no variables",
                    descriptor.name
                )));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = descriptor.variables.iter().find(|v| !seen.insert(**v)) {
                return Err(ConfigError::InvalidRegistry(format!(
                    "{} lists variable {} twice",
                    descriptor.name, dup
                )));
            }
            if descriptor.coverage.start > descriptor.coverage.end {
                return Err(ConfigError::InvalidRegistry(format!(
                    "{} coverage starts after it ends",
                    descriptor.name
                )));
            }
            if missions.insert(descriptor.name, descriptor.clone()).is_some() {
                return Err(ConfigError::InvalidRegistry(format!(
                    "duplicate mission {}",
                    descriptor.name
                )));
            }
        }
        Ok(Self { missions })
    }

    /// Look up a mission, failing if it is unknown.
    pub fn get(&self, mission: &str) -> ConfigResult<&MissionDescriptor> {
        self.missions
            .get(mission)
            .ok_or_else(|| ConfigError::UnknownMission {
                mission: mission.to_string(),
                valid: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Mission names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.missions.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MissionDescriptor> {
        self.missions.values()
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    /// Check that `date` lies within the mission's coverage.
    ///
    /// An unknown mission is an `Err`. A date outside coverage is logged and
    /// returned as `Ok(Some(warning))`.
    pub fn validate(&self, mission: &str, date: NaiveDate) -> ConfigResult<Option<RangeWarning>> {
        let descriptor = self.get(mission)?;
        if descriptor.coverage.contains(date) {
            return Ok(None);
        }
        let warning = RangeWarning::DateOutOfRange {
            mission: descriptor.name.to_string(),
            date,
            start: descriptor.coverage.start,
            end: descriptor.coverage.end,
        };
        warn!(mission = descriptor.name, %date, "{}. All values will be no-data values", warning);
        Ok(Some(warning))
    }

    /// Check longitude against [-180, 180] and latitude against [-90, 90],
    /// both inclusive.
    pub fn validate_lon_lat(lon: f64, lat: f64) -> Option<RangeWarning> {
        let warning = if !(LONGITUDE_RANGE.0..=LONGITUDE_RANGE.1).contains(&lon) {
            RangeWarning::LongitudeOutOfRange(lon)
        } else if !(LATITUDE_RANGE.0..=LATITUDE_RANGE.1).contains(&lat) {
            RangeWarning::LatitudeOutOfRange(lat)
        } else {
            return None;
        };
        warn!(lon, lat, "{}", warning);
        Some(warning)
    }

    /// True if `mission` is known and exposes `variable`.
    pub fn is_valid_variable(&self, mission: &str, variable: &str) -> bool {
        self.missions
            .get(mission)
            .map(|d| d.has_variable(variable))
            .unwrap_or(false)
    }
}
