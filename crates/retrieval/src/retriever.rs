//! Fetching one mission's data for one query point.
//!
//! Every failure short of a missing dummy dataset is absorbed here: the
//! caller receives the mission's dummy dataset together with the error
//! that forced the substitution, and decides which sentinel to report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use geolocation::{GeolocationError, Locator, PixelMatch};
use metrics::counter;
use netcdf_parser::{Dataset, DatasetLoader, Loaded, Selection, SourceFile};
use sampler_common::{Archive, LonConvention, MissionDescriptor, QueryPoint, UrlTemplate};
use tracing::{debug, info, instrument, warn};

use crate::client::{file_name_from_url, ArchiveClient};
use crate::decompress::{decompress, strip_suffix, Compression};
use crate::error::{RetrievalError, RetrievalResult};
use crate::orbit::{extract_candidates, listing_url};
use crate::scratch::{run_work_dir, scratch_path};
use crate::search::{granule_file_name, search, CmrCatalog, GranuleCatalog, SearchRequest};
use crate::subset::SubsetRequest;

pub const DEFAULT_LISTING_BASE: &str = "https://oceandata.sci.gsfc.nasa.gov";

/// The outcome of one retrieval.
#[derive(Debug)]
pub struct Retrieval {
    pub dataset: Dataset,
    /// Pixel located while choosing among orbit candidates.
    pub pixel: Option<PixelMatch>,
    /// Set when `dataset` is a stand-in for data that could not be fetched.
    pub error: Option<RetrievalError>,
}

impl Retrieval {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            pixel: None,
            error: None,
        }
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}

/// Produces a dataset for a mission at a query point.
///
/// `Err` is reserved for failures that cannot be degraded to a dummy
/// dataset.
#[async_trait]
pub trait MissionRetriever: Send + Sync {
    async fn retrieve(
        &self,
        mission: &MissionDescriptor,
        point: &QueryPoint,
        variables: &[String],
    ) -> RetrievalResult<Retrieval>;
}

/// Settings for [`ArchiveRetriever`].
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Where temporary downloads are written.
    pub work_dir: PathBuf,
    /// Persistent granule cache; downloads are temporary when unset.
    pub cache_dir: Option<PathBuf>,
    pub day_night: Option<String>,
    /// Which ranked catalog hit to fetch.
    pub rank: usize,
    pub listing_base: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            work_dir: run_work_dir(),
            cache_dir: None,
            day_night: Some("day".to_string()),
            rank: 0,
            listing_base: DEFAULT_LISTING_BASE.to_string(),
        }
    }
}

/// Retrieves from the real archives, dispatching on each mission's
/// [`Archive`] strategy.
pub struct ArchiveRetriever {
    client: Arc<ArchiveClient>,
    catalog: Arc<dyn GranuleCatalog>,
    loader: DatasetLoader,
    locator: Locator,
    config: RetrieverConfig,
}

impl ArchiveRetriever {
    pub fn new(
        client: Arc<ArchiveClient>,
        loader: DatasetLoader,
        locator: Locator,
        config: RetrieverConfig,
    ) -> Self {
        let catalog = Arc::new(CmrCatalog::new(client.clone()));
        Self {
            client,
            catalog,
            loader,
            locator,
            config,
        }
    }

    /// Replace the metadata catalog.
    pub fn with_catalog(mut self, catalog: Arc<dyn GranuleCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    async fn fetch_from_catalog(
        &self,
        mission: &MissionDescriptor,
        point: &QueryPoint,
        short_name: &str,
        revisit_hours: i64,
        exclude: &[&str],
    ) -> RetrievalResult<(PathBuf, SourceFile)> {
        let request = SearchRequest {
            mission: mission.name,
            short_name,
            revisit_hours,
            exclude,
            day_night: self.config.day_night.as_deref(),
        };
        let ranked = search(self.catalog.as_ref(), &request, point).await?;
        let chosen = ranked
            .get(self.config.rank)
            .ok_or(RetrievalError::RankUnavailable {
                rank: self.config.rank,
                available: ranked.len(),
            })?;

        debug!(
            file = %chosen.granule.file_name,
            clear_of_edges = chosen.clear_of_edges,
            temporal_diff = chosen.temporal_diff,
            "Selected granule"
        );
        self.fetch(&chosen.granule.url, &[], &chosen.granule.file_name)
            .await
    }

    async fn fetch_subset(
        &self,
        point: &QueryPoint,
        variables: &[String],
        template: &UrlTemplate,
        convention: LonConvention,
    ) -> RetrievalResult<(PathBuf, SourceFile)> {
        let url = template.render(point.date());
        let request = SubsetRequest::around(variables, point, convention);
        let dest = scratch_path(&self.config.work_dir, &file_name_from_url(&url));
        let download = self.client.download(&url, &request.params(), &dest).await?;
        self.unpack(download.path, &download.file_name, SourceFile::Remove)
            .await
    }

    /// Download a granule, into the cache when one is configured.
    async fn fetch(
        &self,
        url: &str,
        query: &[(String, String)],
        file_name: &str,
    ) -> RetrievalResult<(PathBuf, SourceFile)> {
        let (dest, source) = match &self.config.cache_dir {
            Some(dir) => (dir.join(file_name), SourceFile::Keep),
            None => (
                scratch_path(&self.config.work_dir, file_name),
                SourceFile::Remove,
            ),
        };
        let download = self.client.download(url, query, &dest).await?;
        self.unpack(download.path, &download.file_name, source).await
    }

    /// Decompress a downloaded artifact if its name says it is compressed.
    async fn unpack(
        &self,
        path: PathBuf,
        file_name: &str,
        source: SourceFile,
    ) -> RetrievalResult<(PathBuf, SourceFile)> {
        let compression = Compression::detect(file_name);
        if compression == Compression::None {
            return Ok((path, source));
        }

        let output = scratch_path(&self.config.work_dir, strip_suffix(file_name));
        let input = path.clone();
        let target = output.clone();
        let result = tokio::task::spawn_blocking(move || decompress(&input, &target, compression))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))?;

        if source == SourceFile::Remove {
            remove_quietly(&path).await;
        }
        result?;
        Ok((output, SourceFile::Remove))
    }

    async fn open(
        &self,
        path: PathBuf,
        mission: &MissionDescriptor,
        source: SourceFile,
        selection: &Selection,
    ) -> RetrievalResult<Loaded> {
        let loader = self.loader.clone();
        let mission = mission.clone();
        let selection = selection.clone();
        let loaded =
            tokio::task::spawn_blocking(move || loader.open(&path, &mission, source, &selection))
                .await
                .map_err(|e| RetrievalError::Task(e.to_string()))??;
        Ok(loaded)
    }

    async fn open_dummy(
        &self,
        mission: &MissionDescriptor,
        selection: &Selection,
    ) -> RetrievalResult<Dataset> {
        let loader = self.loader.clone();
        let mission = mission.clone();
        let selection = selection.clone();
        let dataset = tokio::task::spawn_blocking(move || loader.open_dummy(&mission, &selection))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))??;
        Ok(dataset)
    }

    async fn fallback(
        &self,
        mission: &MissionDescriptor,
        error: RetrievalError,
        selection: &Selection,
    ) -> RetrievalResult<Retrieval> {
        if error.is_fatal() {
            return Err(error);
        }
        warn!(mission = mission.name, error = %error, "Retrieval failed, using dummy dataset");
        Ok(Retrieval {
            dataset: self.open_dummy(mission, selection).await?,
            pixel: None,
            error: Some(error),
        })
    }

    /// Try each candidate orbit of the day until one holds a valid pixel
    /// near the point.
    async fn search_orbits(
        &self,
        mission: &MissionDescriptor,
        point: &QueryPoint,
        exclude: &[&str],
        selection: &Selection,
    ) -> RetrievalResult<Retrieval> {
        let base = &self.config.listing_base;
        let url = listing_url(base, mission.name, point.date());
        let candidates = match self.client.get_text(&url).await {
            Ok(html) => extract_candidates(&html, mission.name, exclude, base),
            Err(e) => Err(e),
        };
        let candidates = match candidates {
            Ok(c) if c.is_empty() => {
                let error = RetrievalError::NotFound {
                    mission: mission.name.to_string(),
                    window: format!("the orbit listing for {}", point.date()),
                };
                return self.out_of_window(self.fallback(mission, error, selection).await?);
            }
            Ok(c) => c,
            Err(e) => return self.out_of_window(self.fallback(mission, e, selection).await?),
        };
        debug!(candidates = candidates.len(), listing = %url, "Found orbit candidates");

        for candidate in &candidates {
            let file_name = granule_file_name(candidate);
            let (path, source) = match self.fetch(candidate, &[], &file_name).await {
                Ok(fetched) => fetched,
                Err(e) => return self.out_of_window(self.fallback(mission, e, selection).await?),
            };

            let loaded = self.open(path, mission, source, selection).await?;
            if let Some(e) = loaded.error {
                return self.out_of_window(Retrieval {
                    dataset: loaded.dataset,
                    pixel: None,
                    error: Some(e.into()),
                });
            }

            match self
                .locator
                .locate(&loaded.dataset, point.latitude, point.longitude)
            {
                Ok(PixelMatch::Found(index)) => {
                    debug!(file = %file_name, row = index.row, col = index.col, "Located point in orbit");
                    return Ok(Retrieval {
                        dataset: loaded.dataset,
                        pixel: Some(PixelMatch::Found(index)),
                        error: None,
                    });
                }
                Ok(PixelMatch::OutOfWindow) | Err(GeolocationError::AllMasked(_)) => {
                    debug!(file = %file_name, "Point not covered by orbit, trying next");
                }
                Err(e) => {
                    return self.out_of_window(Retrieval {
                        dataset: loaded.dataset,
                        pixel: None,
                        error: Some(e.into()),
                    });
                }
            }
        }

        info!(
            mission = mission.name,
            candidates = candidates.len(),
            "No orbit covers the point"
        );
        self.out_of_window(Retrieval::new(self.open_dummy(mission, selection).await?))
    }

    fn out_of_window(&self, mut retrieval: Retrieval) -> RetrievalResult<Retrieval> {
        retrieval.pixel = Some(PixelMatch::OutOfWindow);
        Ok(retrieval)
    }
}

#[async_trait]
impl MissionRetriever for ArchiveRetriever {
    #[instrument(
        skip(self, mission, variables),
        fields(mission = mission.name, strategy = mission.archive.kind())
    )]
    async fn retrieve(
        &self,
        mission: &MissionDescriptor,
        point: &QueryPoint,
        variables: &[String],
    ) -> RetrievalResult<Retrieval> {
        let selection = Selection::variables(variables).near(point.latitude, point.longitude);
        let fetched = match &mission.archive {
            Archive::MetadataSearch {
                short_name,
                revisit_hours,
                exclude,
            } => {
                self.fetch_from_catalog(mission, point, short_name, *revisit_hours, exclude)
                    .await
            }
            Archive::Subsetting {
                url,
                lon_convention,
            } => {
                self.fetch_subset(point, variables, url, *lon_convention)
                    .await
            }
            Archive::StaticLocal { file_name } => {
                Ok((self.loader.dataset_dir().join(file_name), SourceFile::Keep))
            }
            Archive::OrbitSearch { exclude } => {
                let retrieval = self
                    .search_orbits(mission, point, exclude, &selection)
                    .await?;
                record_outcome(mission, &retrieval);
                return Ok(retrieval);
            }
        };

        let retrieval = match fetched {
            Ok((path, source)) => {
                let loaded = self.open(path, mission, source, &selection).await?;
                Retrieval {
                    dataset: loaded.dataset,
                    pixel: None,
                    error: loaded.error.map(RetrievalError::from),
                }
            }
            Err(e) => self.fallback(mission, e, &selection).await?,
        };

        record_outcome(mission, &retrieval);
        Ok(retrieval)
    }
}

fn record_outcome(mission: &MissionDescriptor, retrieval: &Retrieval) {
    let outcome = if retrieval.is_errored() {
        "fallback"
    } else {
        "ok"
    };
    counter!("sampler_retrievals_total", "mission" => mission.name, "outcome" => outcome)
        .increment(1);
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
        }
    }
}
