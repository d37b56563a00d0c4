//! Orchestration of a sampler run.
//!
//! Input rows are grouped by (time, date, latitude, longitude) so each
//! unique key is retrieved once per mission. Keys are processed in chunks;
//! after each chunk the rows are appended to the output table.
//!
//! Two execution modes share the per-mission task:
//! - [`ExecutionMode::Sequential`]: keys then missions, one at a time.
//! - [`ExecutionMode::Parallel`]: each key fans out one task per mission and
//!   a merge step joins them; several keys are in flight at once, and rows
//!   still come out in input order.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod execute;
pub mod input;
pub mod output;
pub mod process;
pub mod request;
pub mod row;
pub mod sample;

pub use config::{ExecutionMode, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use execute::Executor;
pub use input::{read_groups, KeyGroup};
pub use output::{output_path, OutputWriter, BASE_COLUMNS};
pub use process::{RunSummary, SamplerProcess};
pub use request::MissionRequest;
pub use sample::{MissionSamples, Sample, Sampler};
