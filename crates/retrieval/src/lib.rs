//! Retrieval of mission data from the remote archives.
//!
//! Four strategies cover every mission:
//!
//! - **Metadata search**: query the granule catalog around the point, rank
//!   the hits and download the best one.
//! - **Subsetting**: ask a THREDDS service for a ±1° box around the point.
//! - **Orbit search**: walk the day's listing page and geolocate each
//!   candidate orbit until one covers the point.
//! - **Static local**: open a fixed file from the dataset directory.
//!
//! [`ArchiveRetriever`] dispatches on the mission's strategy and always
//! hands back a dataset: on failure it substitutes the mission's dummy
//! dataset and reports the error in [`Retrieval::error`].

pub mod client;
pub mod decompress;
pub mod error;
pub mod orbit;
pub mod retriever;
pub mod retry;
pub mod scratch;
pub mod search;
pub mod subset;

pub use client::{ArchiveClient, ClientConfig, Credentials, Download};
pub use error::{RetrievalError, RetrievalResult};
pub use retriever::{ArchiveRetriever, MissionRetriever, Retrieval, RetrieverConfig};
pub use retry::RetryPolicy;
pub use scratch::{
    is_run_work_dir, is_scratch_file, run_work_dir, scratch_path, RUN_DIR_PREFIX, TEMP_PREFIX,
};
pub use search::{CatalogQuery, CmrCatalog, Granule, GranuleCatalog, RankedGranule};
pub use subset::SubsetRequest;
