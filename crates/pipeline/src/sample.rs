//! Sampling one mission at one group key.
//!
//! This is the body of a per-mission task. Everything that concerns a
//! single observation is folded into [`Sample::NoData`] or
//! [`Sample::Errored`]; only failures the retriever cannot degrade come
//! back as `Err`.

use std::collections::BTreeMap;
use std::sync::Arc;

use geolocation::{GeolocationError, Locator, PixelMatch};
use netcdf_parser::Dataset;
use retrieval::{MissionRetriever, RetrievalResult};
use sampler_common::{GroupKey, MissionDescriptor, MissionRegistry, QueryPoint, Sentinels};
use tracing::{debug, instrument, warn};

/// Outcome for one (mission, variable) at one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// A sampled value, already transformed.
    Value(f64),
    /// No valid observation exists.
    NoData,
    /// Retrieval or extraction failed.
    Errored,
}

impl Sample {
    pub fn resolve(self, sentinels: &Sentinels) -> f64 {
        match self {
            Sample::Value(v) => v,
            Sample::NoData => sentinels.no_data,
            Sample::Errored => sentinels.errored,
        }
    }
}

/// One mission's samples for one key, by variable.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionSamples {
    pub mission: String,
    pub values: BTreeMap<String, Sample>,
}

impl MissionSamples {
    fn uniform(mission: &str, variables: &[String], sample: Sample) -> Self {
        Self {
            mission: mission.to_string(),
            values: variables.iter().map(|v| (v.clone(), sample)).collect(),
        }
    }
}

/// Retrieves and samples missions at group keys.
pub struct Sampler {
    registry: Arc<MissionRegistry>,
    retriever: Arc<dyn MissionRetriever>,
    locator: Locator,
}

impl Sampler {
    pub fn new(
        registry: Arc<MissionRegistry>,
        retriever: Arc<dyn MissionRetriever>,
        locator: Locator,
    ) -> Self {
        Self {
            registry,
            retriever,
            locator,
        }
    }

    pub fn registry(&self) -> &MissionRegistry {
        &self.registry
    }

    #[instrument(skip(self, key, mission, variables), fields(mission = mission.name, key = %key))]
    pub async fn sample(
        &self,
        key: &GroupKey,
        mission: &MissionDescriptor,
        variables: &[String],
    ) -> RetrievalResult<MissionSamples> {
        let point = match key.resolve() {
            Ok(point) => point,
            Err(e) => {
                warn!(error = %e, "Unparseable group key, values will be errored");
                return Ok(MissionSamples::uniform(mission.name, variables, Sample::Errored));
            }
        };

        // Range warnings are logged by the registry
        let date_warning = self.registry.validate(mission.name, point.date())?;
        let coord_warning = MissionRegistry::validate_lon_lat(point.longitude, point.latitude);
        if date_warning.is_some() || coord_warning.is_some() {
            return Ok(MissionSamples::uniform(mission.name, variables, Sample::NoData));
        }

        let retrieval = self.retriever.retrieve(mission, &point, variables).await?;
        if let Some(e) = &retrieval.error {
            debug!(error = %e, "Retrieval fell back to dummy dataset");
            return Ok(MissionSamples::uniform(mission.name, variables, Sample::Errored));
        }

        let pixel = if mission.is_georeferenced() {
            None
        } else {
            match retrieval.pixel {
                Some(pixel) => Some(pixel),
                None => match self.locate(&retrieval.dataset, &point) {
                    Ok(pixel) => Some(pixel),
                    Err(e) => {
                        warn!(error = %e, "Geolocation failed");
                        return Ok(MissionSamples::uniform(
                            mission.name,
                            variables,
                            Sample::Errored,
                        ));
                    }
                },
            }
        };

        let values = variables
            .iter()
            .map(|var| {
                let sample = extract(&retrieval.dataset, mission, var, &point, pixel);
                (var.clone(), sample)
            })
            .collect();
        Ok(MissionSamples {
            mission: mission.name.to_string(),
            values,
        })
    }

    /// Locate the point, treating a fully masked raster as out of window.
    fn locate(
        &self,
        dataset: &Dataset,
        point: &QueryPoint,
    ) -> Result<PixelMatch, GeolocationError> {
        match self
            .locator
            .locate(dataset, point.latitude, point.longitude)
        {
            Err(GeolocationError::AllMasked(shape)) => {
                debug!(?shape, "Every pixel is masked");
                Ok(PixelMatch::OutOfWindow)
            }
            other => other,
        }
    }
}

fn extract(
    dataset: &Dataset,
    mission: &MissionDescriptor,
    variable: &str,
    point: &QueryPoint,
    pixel: Option<PixelMatch>,
) -> Sample {
    if !dataset.contains(variable) {
        warn!(mission = mission.name, variable, "Variable missing from dataset");
        return Sample::Errored;
    }

    let raw = match pixel {
        Some(PixelMatch::OutOfWindow) => return Sample::NoData,
        Some(PixelMatch::Found(index)) => dataset.value_at(variable, index.row, index.col),
        None => dataset.nearest_value(variable, point.latitude, point.longitude),
    };

    match raw {
        Ok(v) if v.is_nan() => Sample::NoData,
        Ok(v) => Sample::Value(mission.transform.map_or(v, |t| t.apply(v))),
        Err(e) => {
            warn!(mission = mission.name, variable, error = %e, "Failed to read value");
            Sample::Errored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolocation::PixelIndex;
    use sampler_common::ValueTransform;
    use test_utils::{grid_dataset, swath_dataset};

    fn registry() -> MissionRegistry {
        MissionRegistry::standard().unwrap()
    }

    fn point() -> QueryPoint {
        GroupKey::new("14:30:00", "01/01/2018", "10.0", "20.0")
            .resolve()
            .unwrap()
    }

    #[test]
    fn test_resolve_sentinels() {
        let sentinels = Sentinels::default();
        assert_eq!(Sample::Value(1.5).resolve(&sentinels), 1.5);
        assert_eq!(Sample::NoData.resolve(&sentinels), -9999.0);
        assert_eq!(Sample::Errored.resolve(&sentinels), -9998.0);
    }

    #[test]
    fn test_extract_applies_transform() {
        let registry = registry();
        let mut mission = registry.get("OI-SST").unwrap().clone();
        mission.transform = Some(ValueTransform::KelvinToCelsius);
        let dataset = grid_dataset("sst", &[10.0], &[20.0], |_, _| 300.0);

        let sample = extract(&dataset, &mission, "sst", &point(), None);

        match sample {
            Sample::Value(v) => assert!((v - 26.85).abs() < 1e-9),
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_nan_is_no_data() {
        let registry = registry();
        let mission = registry.get("OI-SST").unwrap();
        let dataset = grid_dataset("sst", &[10.0], &[20.0], |_, _| f64::NAN);

        assert_eq!(extract(&dataset, mission, "sst", &point(), None), Sample::NoData);
    }

    #[test]
    fn test_extract_missing_variable_is_errored() {
        let registry = registry();
        let mission = registry.get("OI-SST").unwrap();
        let dataset = grid_dataset("other", &[10.0], &[20.0], |_, _| 1.0);

        assert_eq!(extract(&dataset, mission, "sst", &point(), None), Sample::Errored);
    }

    #[test]
    fn test_extract_out_of_window_is_no_data() {
        let registry = registry();
        let mission = registry.get("MODIS-Aqua").unwrap();
        let dataset = swath_dataset(3, 3, 10.0, 20.0, 0.1);

        let sample = extract(
            &dataset,
            mission,
            "chlor_a",
            &point(),
            Some(PixelMatch::OutOfWindow),
        );
        assert_eq!(sample, Sample::NoData);
    }

    #[test]
    fn test_extract_uses_pixel_index() {
        let registry = registry();
        let mission = registry.get("MODIS-Aqua").unwrap();
        let dataset = swath_dataset(3, 3, 10.0, 20.0, 0.1);
        let expected = dataset.value_at("chlor_a", 1, 2).unwrap();

        let sample = extract(
            &dataset,
            mission,
            "chlor_a",
            &point(),
            Some(PixelMatch::Found(PixelIndex { row: 1, col: 2 })),
        );
        assert_eq!(sample, Sample::Value(expected));
    }
}
