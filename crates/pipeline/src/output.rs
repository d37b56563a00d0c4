//! Writing the output table.
//!
//! The header is written when the writer is created. Rows are appended one
//! chunk at a time and flushed, so a crash loses at most the chunk in
//! progress.

use std::fs::File;
use std::path::{Path, PathBuf};

use metrics::counter;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::input::KeyGroup;
use crate::request::MissionRequest;

/// Leading columns, copied from each input row.
pub const BASE_COLUMNS: [&str; 5] = [
    "Time[hhmm]",
    "Date[mmddyyyy]",
    "Lat.[-90-90 deg.]",
    "Long.[0-360.E]",
    "Chl-a",
];

pub const OUTPUT_SUFFIX: &str = "_output.csv";

/// `{dir}/{input stem}_output.csv`
pub fn output_path(dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sampler".to_string());
    dir.join(format!("{}{}", stem, OUTPUT_SUFFIX))
}

#[derive(Debug)]
pub struct OutputWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    columns: usize,
    rows_written: usize,
}

impl OutputWriter {
    /// Create (or truncate) the output file and write its header.
    pub fn create(path: impl Into<PathBuf>, request: &MissionRequest) -> PipelineResult<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| PipelineError::output(&path, e))?;
        let mut writer = csv::WriterBuilder::new().from_writer(file);

        let header: Vec<String> = BASE_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(request.column_names())
            .collect();
        writer
            .write_record(&header)
            .map_err(|e| PipelineError::output(&path, e))?;
        writer.flush().map_err(|e| PipelineError::output(&path, e))?;

        Ok(Self {
            path,
            writer,
            columns: request.column_count(),
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Append one row per observation of each group, then flush.
    ///
    /// `values[i]` holds the sampled values for `groups[i]`.
    pub fn write_chunk(&mut self, groups: &[KeyGroup], values: &[Vec<f64>]) -> PipelineResult<()> {
        if groups.len() != values.len() {
            return Err(PipelineError::output(
                &self.path,
                format!("{} keys but {} value rows", groups.len(), values.len()),
            ));
        }

        let mut written = 0;
        for (group, row) in groups.iter().zip(values) {
            if row.len() != self.columns {
                return Err(PipelineError::output(
                    &self.path,
                    format!(
                        "row for {} has {} values, expected {}",
                        group.key,
                        row.len(),
                        self.columns
                    ),
                ));
            }
            let rendered: Vec<String> = row.iter().map(|v| v.to_string()).collect();

            for observation in &group.observations {
                let key = &observation.key;
                let record = [
                    key.time.as_str(),
                    key.date.as_str(),
                    key.latitude.as_str(),
                    key.longitude.as_str(),
                    observation.auxiliary.as_str(),
                ]
                .into_iter()
                .chain(rendered.iter().map(String::as_str));
                self.writer
                    .write_record(record)
                    .map_err(|e| PipelineError::output(&self.path, e))?;
                written += 1;
            }
        }

        self.writer
            .flush()
            .map_err(|e| PipelineError::output(&self.path, e))?;
        self.rows_written += written;
        counter!("sampler_rows_written_total").increment(written as u64);
        debug!(path = %self.path.display(), rows = written, "Appended chunk");
        Ok(())
    }
}
