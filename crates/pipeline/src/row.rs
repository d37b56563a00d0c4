//! Merging per-mission samples into one output row.

use std::collections::HashMap;

use sampler_common::{GroupKey, Sentinels};

use crate::error::{PipelineError, PipelineResult};
use crate::request::MissionRequest;
use crate::sample::MissionSamples;

/// Values for one group key in column order.
///
/// Fails with [`PipelineError::IncompleteRow`] if any requested
/// (mission, variable) pair has no sample. Extra samples are ignored.
pub fn merge_row(
    key: &GroupKey,
    request: &MissionRequest,
    parts: &[MissionSamples],
    sentinels: &Sentinels,
) -> PipelineResult<Vec<f64>> {
    let by_mission: HashMap<&str, &MissionSamples> =
        parts.iter().map(|p| (p.mission.as_str(), p)).collect();

    request
        .columns()
        .map(|(mission, variable)| {
            by_mission
                .get(mission)
                .and_then(|p| p.values.get(variable))
                .map(|sample| sample.resolve(sentinels))
                .ok_or_else(|| PipelineError::IncompleteRow {
                    key: key.to_string(),
                    column: format!("{}-{}", mission, variable),
                })
        })
        .collect()
}
