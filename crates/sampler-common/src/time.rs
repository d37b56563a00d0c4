//! Temporal query windows.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Timestamp format understood by the granule metadata catalog and the
/// subsetting services.
pub const CATALOG_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// An inclusive `[start, end]` interval of naive UTC timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TemporalWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// 00:00:00 through 23:59:59 of the timestamp's day.
    pub fn whole_day(at: NaiveDateTime) -> Self {
        let start = at.date().and_time(NaiveTime::default());
        Self {
            start,
            end: start + Duration::seconds(86_399),
        }
    }

    /// The `hours` leading up to and including the timestamp.
    pub fn trailing(at: NaiveDateTime, hours: i64) -> Self {
        Self {
            start: at - Duration::hours(hours),
            end: at,
        }
    }

    /// Check if a timestamp falls within this window.
    pub fn contains(&self, t: &NaiveDateTime) -> bool {
        t >= &self.start && t <= &self.end
    }

    /// Formatted `(start, end)` pair.
    pub fn bounds(&self) -> (String, String) {
        (
            self.start.format(CATALOG_TIME_FORMAT).to_string(),
            self.end.format(CATALOG_TIME_FORMAT).to_string(),
        )
    }

    /// `"start,end"` as used by the catalog's `temporal` parameter.
    pub fn to_query_value(&self) -> String {
        let (start, end) = self.bounds();
        format!("{},{}", start, end)
    }
}

impl std::fmt::Display for TemporalWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query_value())
    }
}
