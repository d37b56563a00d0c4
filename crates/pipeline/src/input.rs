//! Reading the observation table.

use std::collections::HashMap;
use std::path::Path;

use sampler_common::{GroupKey, Observation};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Columns the input table must have at least: time, date, latitude,
/// longitude. The auxiliary value is optional.
const MIN_COLUMNS: usize = 4;

/// Observations sharing one group key, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyGroup {
    pub key: GroupKey,
    pub observations: Vec<Observation>,
}

/// Read an input table and group its rows by key.
///
/// Groups come back in the order their key was first seen.
pub fn read_groups(path: &Path) -> PipelineResult<Vec<KeyGroup>> {
    let observations = read_observations(path)?;
    let groups = group_observations(observations);
    debug!(path = %path.display(), keys = groups.len(), "Grouped input rows");
    Ok(groups)
}

/// Parse every data row of the table.
///
/// A single-field row directly after the header is a row count and is
/// skipped. Missing trailing fields read as empty strings.
pub fn read_observations(path: &Path) -> PipelineResult<Vec<Observation>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| PipelineError::input(path, e))?;

    let header_len = reader
        .headers()
        .map_err(|e| PipelineError::input(path, e))?
        .len();
    if header_len < MIN_COLUMNS {
        return Err(PipelineError::input(
            path,
            format!(
                "header has {} columns, expected at least {}",
                header_len, MIN_COLUMNS
            ),
        ));
    }

    let mut observations = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| PipelineError::input(path, e))?;
        if i == 0 && record.len() == 1 {
            continue;
        }
        if record.iter().all(str::is_empty) {
            continue;
        }
        let field = |n: usize| record.get(n).unwrap_or("");
        observations.push(Observation::new(
            GroupKey::new(field(0), field(1), field(2), field(3)),
            field(4),
        ));
    }
    Ok(observations)
}

/// Group observations by key, keeping first-seen key order.
pub fn group_observations(observations: Vec<Observation>) -> Vec<KeyGroup> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<KeyGroup> = Vec::new();

    for observation in observations {
        match index.get(&observation.key) {
            Some(&i) => groups[i].observations.push(observation),
            None => {
                index.insert(observation.key.clone(), groups.len());
                groups.push(KeyGroup {
                    key: observation.key.clone(),
                    observations: vec![observation],
                });
            }
        }
    }
    groups
}
