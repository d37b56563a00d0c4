//! The sampler process: input table in, output table out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use retrieval::MissionRetriever;
use sampler_common::{GroupKey, MissionRegistry};
use tracing::{info, instrument, warn};

use crate::cleanup::{remove_residual, remove_run_dir};
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::execute::Executor;
use crate::input::read_groups;
use crate::output::{output_path, OutputWriter};
use crate::request::MissionRequest;
use crate::sample::Sampler;

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub observations: usize,
    pub keys: usize,
    pub chunks: usize,
    pub rows_written: usize,
    pub residual_removed: usize,
}

pub struct SamplerProcess {
    config: PipelineConfig,
    registry: Arc<MissionRegistry>,
    request: Arc<MissionRequest>,
    retriever: Arc<dyn MissionRetriever>,
}

impl SamplerProcess {
    pub fn new(
        config: PipelineConfig,
        registry: Arc<MissionRegistry>,
        request: MissionRequest,
        retriever: Arc<dyn MissionRetriever>,
    ) -> Self {
        Self {
            config,
            registry,
            request: Arc::new(request),
            retriever,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sample every observation of `input` and write
    /// `{output_dir}/{stem}_output.csv`.
    ///
    /// Residual temporary files are removed whether or not the run
    /// succeeds.
    #[instrument(skip(self), fields(mode = ?self.config.mode))]
    pub async fn run(&self, input: &Path, output_dir: &Path) -> PipelineResult<RunSummary> {
        let result = self.process(input, output_dir).await;

        let removed = remove_residual(&self.config.work_dir);
        if removed > 0 {
            warn!(
                removed,
                dir = %self.config.work_dir.display(),
                "Removed residual temporary files"
            );
        }
        remove_run_dir(&self.config.work_dir);

        result.map(|summary| RunSummary {
            residual_removed: removed,
            ..summary
        })
    }

    async fn process(&self, input: &Path, output_dir: &Path) -> PipelineResult<RunSummary> {
        let start = Instant::now();
        let groups = read_groups(input)?;
        let observations: usize = groups.iter().map(|g| g.observations.len()).sum();

        let mut writer = OutputWriter::create(output_path(output_dir, input), &self.request)?;
        let executor = self.executor()?;

        let chunk_size = self.config.chunk_size.max(1);
        let chunks = groups.len().div_ceil(chunk_size);
        info!(
            input = %input.display(),
            output = %writer.path().display(),
            observations,
            keys = groups.len(),
            chunks,
            columns = self.request.column_count(),
            "Starting sampler run"
        );

        for (i, chunk) in groups.chunks(chunk_size).enumerate() {
            let chunk_start = Instant::now();
            let keys: Vec<GroupKey> = chunk.iter().map(|g| g.key.clone()).collect();

            let rows = executor.sample_keys(&keys).await?;
            writer.write_chunk(chunk, &rows)?;

            info!(
                chunk = i + 1,
                chunks,
                keys = keys.len(),
                rows_written = writer.rows_written(),
                elapsed_ms = chunk_start.elapsed().as_millis() as u64,
                "Chunk complete"
            );
        }

        info!(
            rows_written = writer.rows_written(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Sampler run complete"
        );

        Ok(RunSummary {
            output: writer.path().to_path_buf(),
            observations,
            keys: groups.len(),
            chunks,
            rows_written: writer.rows_written(),
            residual_removed: 0,
        })
    }

    fn executor(&self) -> PipelineResult<Executor> {
        let sampler = Sampler::new(
            self.registry.clone(),
            self.retriever.clone(),
            self.config.locator(),
        );
        Executor::new(
            Arc::new(sampler),
            self.request.clone(),
            self.config.sentinels,
            self.config.task_retry,
            self.config.mode,
            self.config.max_concurrent_keys,
        )
    }
}
