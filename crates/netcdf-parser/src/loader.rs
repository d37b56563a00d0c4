//! Opening mission files with fallback to the mission's dummy dataset.

use std::path::{Path, PathBuf};

use sampler_common::MissionDescriptor;
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::error::{NetCdfError, NetCdfResult};
use crate::native::{read_dataset, Selection};

/// Whether the file passed to [`DatasetLoader::open`] is removed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFile {
    Keep,
    Remove,
}

/// A dataset plus the error that forced a fallback, if any.
#[derive(Debug)]
pub struct Loaded {
    pub dataset: Dataset,
    pub error: Option<NetCdfError>,
}

impl Loaded {
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

/// Opens mission files, substituting the stand-in dataset on failure.
///
/// Every mission has a dummy dataset in `dataset_dir` that is guaranteed to
/// open cleanly. It is never removed.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    dataset_dir: PathBuf,
}

impl DatasetLoader {
    pub fn new(dataset_dir: impl Into<PathBuf>) -> Self {
        Self {
            dataset_dir: dataset_dir.into(),
        }
    }

    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    pub fn dummy_path(&self, mission: &MissionDescriptor) -> PathBuf {
        self.dataset_dir.join(mission.dummy_dataset)
    }

    /// Open the mission's dummy dataset.
    ///
    /// Failure here cannot be degraded any further and is reported as
    /// [`NetCdfError::DummyUnavailable`].
    pub fn open_dummy(
        &self,
        mission: &MissionDescriptor,
        selection: &Selection,
    ) -> NetCdfResult<Dataset> {
        let path = self.dummy_path(mission);
        read_dataset(&path, mission.layout, selection).map_err(|e| NetCdfError::DummyUnavailable {
            mission: mission.name.to_string(),
            path,
            source: Box::new(e),
        })
    }

    /// Open `path`, falling back to the dummy dataset on any error.
    ///
    /// Only a missing or unreadable dummy dataset is returned as `Err`.
    pub fn open(
        &self,
        path: &Path,
        mission: &MissionDescriptor,
        source: SourceFile,
        selection: &Selection,
    ) -> NetCdfResult<Loaded> {
        let result = read_dataset(path, mission.layout, selection);

        if source == SourceFile::Remove && path != self.dummy_path(mission) {
            remove_quietly(path);
        }

        match result {
            Ok(dataset) => Ok(Loaded {
                dataset,
                error: None,
            }),
            Err(e) => {
                warn!(
                    mission = mission.name,
                    path = %path.display(),
                    error = %e,
                    "Failed to open dataset, using dummy dataset"
                );
                Ok(Loaded {
                    dataset: self.open_dummy(mission, selection)?,
                    error: Some(e),
                })
            }
        }
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed source file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove source file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sampler_common::{Archive, DataLayout, DateCoverage};

    fn mission() -> MissionDescriptor {
        let day = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        MissionDescriptor {
            name: "OI-SST",
            variables: &["sst"],
            coverage: DateCoverage {
                start: day,
                end: day,
            },
            layout: DataLayout::Grid,
            archive: Archive::StaticLocal { file_name: "OISST.nc" },
            transform: None,
            dummy_dataset: "OISST.nc",
        }
    }

    fn write_grid(path: &Path, value: f32) {
        let mut file = netcdf::create(path).unwrap();
        file.add_dimension("lat", 1).unwrap();
        file.add_dimension("lon", 1).unwrap();
        file.add_variable::<f32>("lat", &["lat"])
            .unwrap()
            .put_values(&[0.0f32], ..)
            .unwrap();
        file.add_variable::<f32>("lon", &["lon"])
            .unwrap()
            .put_values(&[0.0f32], ..)
            .unwrap();
        file.add_variable::<f32>("sst", &["lat", "lon"])
            .unwrap()
            .put_values(&[value], ..)
            .unwrap();
    }

    #[test]
    fn test_open_removes_downloaded_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path());
        let download = dir.path().join("sampler-download.nc");
        write_grid(&download, 21.5);

        let loaded = loader
            .open(&download, &mission(), SourceFile::Remove, &Selection::all())
            .unwrap();
        assert!(!loaded.is_fallback());
        assert_eq!(loaded.dataset.nearest_value("sst", 0.0, 0.0).unwrap(), 21.5);
        assert!(!download.exists());
    }

    #[test]
    fn test_open_falls_back_to_dummy() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path());
        write_grid(&dir.path().join("OISST.nc"), -1.0);

        let loaded = loader
            .open(
                &dir.path().join("missing.nc"),
                &mission(),
                SourceFile::Remove,
                &Selection::all(),
            )
            .unwrap();
        assert!(loaded.is_fallback());
        assert_eq!(loaded.dataset.source(), dir.path().join("OISST.nc"));
    }

    #[test]
    fn test_dummy_is_never_removed() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path());
        let dummy = dir.path().join("OISST.nc");
        write_grid(&dummy, -1.0);

        loader
            .open(&dummy, &mission(), SourceFile::Remove, &Selection::all())
            .unwrap();
        assert!(dummy.exists());
    }

    #[test]
    fn test_missing_dummy_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path());
        let err = loader
            .open(
                &dir.path().join("missing.nc"),
                &mission(),
                SourceFile::Keep,
                &Selection::all(),
            )
            .unwrap_err();
        assert!(matches!(err, NetCdfError::DummyUnavailable { .. }));
    }
}
