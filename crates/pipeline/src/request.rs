//! Which variables to sample from which missions.

use std::collections::{BTreeMap, BTreeSet};

use sampler_common::{ConfigError, ConfigResult, MissionRegistry};

/// Requested variables per mission, both in sorted order.
///
/// The sort order defines the output column order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MissionRequest {
    missions: BTreeMap<String, BTreeSet<String>>,
}

impl MissionRequest {
    /// Parse `"Mission:var Mission:var2 Other:var"`.
    ///
    /// Pairs are separated by whitespace or commas. Every pair is checked
    /// against the registry.
    pub fn parse(request: &str, registry: &MissionRegistry) -> ConfigResult<Self> {
        let pairs = request
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|pair| {
                let (mission, variable) = pair
                    .split_once(':')
                    .filter(|(m, v)| !m.is_empty() && !v.is_empty())
                    .ok_or_else(|| ConfigError::MalformedRequest(pair.to_string()))?;
                Ok((mission.to_string(), variable.to_string()))
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Self::from_pairs(pairs, registry)
    }

    /// Build from `(mission, variable)` pairs, validating each.
    pub fn from_pairs<I>(pairs: I, registry: &MissionRegistry) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut missions: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (mission, variable) in pairs {
            let descriptor = registry.get(&mission)?;
            if !descriptor.has_variable(&variable) {
                return Err(ConfigError::UnknownVariable { mission, variable });
            }
            missions.entry(mission).or_default().insert(variable);
        }

        if missions.is_empty() {
            return Err(ConfigError::MalformedRequest(
                "no mission variables requested".to_string(),
            ));
        }
        Ok(Self { missions })
    }

    /// Mission names in sorted order.
    pub fn missions(&self) -> impl Iterator<Item = &str> {
        self.missions.keys().map(String::as_str)
    }

    /// Requested variables of one mission, sorted.
    pub fn variables(&self, mission: &str) -> Vec<String> {
        self.missions
            .get(mission)
            .map(|vars| vars.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// `(mission, variable)` pairs in output column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.missions
            .iter()
            .flat_map(|(m, vars)| vars.iter().map(move |v| (m.as_str(), v.as_str())))
    }

    /// Column headers, `Mission-variable`.
    pub fn column_names(&self) -> Vec<String> {
        self.columns()
            .map(|(m, v)| format!("{}-{}", m, v))
            .collect()
    }

    /// Number of value columns in every output row.
    pub fn column_count(&self) -> usize {
        self.missions.values().map(BTreeSet::len).sum()
    }
}
