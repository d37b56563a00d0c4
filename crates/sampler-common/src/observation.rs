//! Observations read from the input table and the keys that group them.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::ObservationError;

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%H%M"];
const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%m%d%Y", "%Y-%m-%d"];

/// The (time, date, latitude, longitude) fields of an input row, exactly as
/// written. Rows sharing a key are retrieved once per mission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub time: String,
    pub date: String,
    pub latitude: String,
    pub longitude: String,
}

/// A parsed group key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
}

impl QueryPoint {
    pub fn new(timestamp: NaiveDateTime, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

impl GroupKey {
    pub fn new(
        time: impl Into<String>,
        date: impl Into<String>,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
    ) -> Self {
        Self {
            time: time.into().trim().to_string(),
            date: date.into().trim().to_string(),
            latitude: latitude.into().trim().to_string(),
            longitude: longitude.into().trim().to_string(),
        }
    }

    /// Parse the raw fields into a timestamp and coordinates.
    pub fn resolve(&self) -> Result<QueryPoint, ObservationError> {
        let time = parse_with(&self.time, TIME_FORMATS, NaiveTime::parse_from_str)
            .ok_or_else(|| ObservationError::InvalidTime(self.time.clone()))?;
        let date = parse_with(&self.date, DATE_FORMATS, NaiveDate::parse_from_str)
            .ok_or_else(|| ObservationError::InvalidDate(self.date.clone()))?;
        Ok(QueryPoint {
            timestamp: date.and_time(time),
            latitude: parse_coordinate(&self.latitude)?,
            longitude: parse_coordinate(&self.longitude)?,
        })
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}, {})",
            self.date, self.time, self.latitude, self.longitude
        )
    }
}

fn parse_with<T, E>(
    raw: &str,
    formats: &[&str],
    parse: fn(&str, &str) -> Result<T, E>,
) -> Option<T> {
    formats.iter().find_map(|fmt| parse(raw, fmt).ok())
}

fn parse_coordinate(raw: &str) -> Result<f64, ObservationError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ObservationError::InvalidCoordinate(raw.to_string()))
}

/// One input row: a group key plus its auxiliary value (chlorophyll),
/// carried through to the output untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub key: GroupKey,
    pub auxiliary: String,
}

impl Observation {
    pub fn new(key: GroupKey, auxiliary: impl Into<String>) -> Self {
        Self {
            key,
            auxiliary: auxiliary.into().trim().to_string(),
        }
    }
}
