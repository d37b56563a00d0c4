//! Candidate discovery for missions without catalog metadata.
//!
//! The archive publishes one listing page per mission and day of year.
//! Level-2 ocean-colour files are linked from it; their names start with
//! the mission's initial followed by the acquisition time, so sorting the
//! links orders them chronologically.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::{RetrievalError, RetrievalResult};

pub const ARCHIVE_HOST: &str = "oceandata.sci.gsfc.nasa.gov";

/// Listing page for one mission and day.
pub fn listing_url(base: &str, mission: &str, date: NaiveDate) -> String {
    format!(
        "{}/{}/L2/{:04}/{:03}/",
        base.trim_end_matches('/'),
        mission,
        date.year(),
        date.ordinal()
    )
}

fn candidate_pattern(mission: &str) -> RetrievalResult<Regex> {
    let initial = mission
        .chars()
        .next()
        .ok_or_else(|| RetrievalError::Catalog("empty mission name".to_string()))?;
    let pattern = format!(
        r"{}/ob/getfile/({}[0-9]*[0-9a-z]\.[0-9A-Z]*_[0-9A-Z]*_OC\.[a-z]*)",
        regex::escape(ARCHIVE_HOST),
        regex::escape(&initial.to_string())
    );
    Regex::new(&pattern).map_err(|e| RetrievalError::Catalog(e.to_string()))
}

/// Distinct candidate URLs in a listing page, sorted, with excluded links
/// removed.
///
/// Candidates are downloaded from `base`, the same host that serves the
/// listing.
pub fn extract_candidates(
    html: &str,
    mission: &str,
    exclude: &[&str],
    base: &str,
) -> RetrievalResult<Vec<String>> {
    let pattern = candidate_pattern(mission)?;
    let names: BTreeSet<&str> = pattern
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|name| !exclude.iter().any(|e| name.contains(e)))
        .collect();
    let base = base.trim_end_matches('/');
    Ok(names
        .into_iter()
        .map(|name| format!("{}/ob/getfile/{}", base, name))
        .collect())
}
