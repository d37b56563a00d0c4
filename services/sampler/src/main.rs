//! Ocean satellite sampler.
//!
//! Reads a table of field observations, samples the requested mission
//! variables at each observation, and writes `{input}_output.csv`:
//! - Unique (time, date, lat, lon) keys are retrieved once per mission
//! - Keys are processed in chunks and appended as each chunk completes
//! - Missions of a key can run as parallel tasks (`--parallel`)
//! - Failures for a single observation become sentinel values

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use geolocation::FlagMask;
use pipeline::{ExecutionMode, MissionRequest, PipelineConfig, SamplerProcess};
use retrieval::Credentials;
use sampler_common::MissionRegistry;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sampler")]
#[command(about = "Sample ocean satellite products at field observations")]
struct Args {
    /// Input observation table (CSV)
    #[arg(short = 'f', long)]
    input: PathBuf,

    /// Directory for the output table
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Requested variables, e.g. "MODIS-Aqua:chlor_a OI-SST:sst"
    #[arg(short, long)]
    missions: String,

    /// Run each key's missions as parallel tasks
    #[arg(long)]
    parallel: bool,

    /// YAML run configuration
    #[arg(long, env = "SAMPLER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding dummy and static datasets
    #[arg(long, env = "SAMPLER_DATASET_DIR")]
    dummy_dir: Option<PathBuf>,

    /// Directory for temporary downloads
    #[arg(long, env = "SAMPLER_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Persistent granule cache
    #[arg(long, env = "SAMPLER_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Group keys per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Keys in flight at once in parallel mode
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Value written when no valid observation exists
    #[arg(long, allow_hyphen_values = true)]
    no_data: Option<f64>,

    /// Value written when retrieval or extraction failed
    #[arg(long, allow_hyphen_values = true)]
    errored_data: Option<f64>,

    /// Quality flag mask for swath pixels
    #[arg(long)]
    flag_mask: Option<FlagMask>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    /// Load the YAML configuration, if any, and apply flag overrides.
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if self.parallel {
            config.mode = ExecutionMode::Parallel;
        }
        if let Some(dir) = &self.dummy_dir {
            config.dummy_dir = dir.clone();
        }
        if let Some(dir) = &self.work_dir {
            config.work_dir = dir.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(n) = self.max_concurrent {
            config.max_concurrent_keys = n;
        }
        if let Some(value) = self.no_data {
            config.sentinels.no_data = value;
        }
        if let Some(value) = self.errored_data {
            config.sentinels.errored = value;
        }
        if let Some(mask) = self.flag_mask {
            config.flag_mask = mask;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn log_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&args.log_level))
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    netcdf_parser::silence_hdf5_errors();

    let config = args.pipeline_config()?;
    let registry = Arc::new(MissionRegistry::standard().context("Invalid mission registry")?);
    let request = MissionRequest::parse(&args.missions, &registry)
        .with_context(|| format!("Invalid mission request '{}'", args.missions))?;

    let credentials = Credentials::from_env();
    if credentials.is_none() {
        warn!("EARTHDATA_USERNAME/EARTHDATA_PASSWORD not set, authenticated downloads will fail");
    }

    tokio::fs::create_dir_all(&args.output_dir).await?;
    tokio::fs::create_dir_all(&config.work_dir).await?;
    if let Some(cache) = &config.cache_dir {
        tokio::fs::create_dir_all(cache).await?;
    }

    info!(
        input = %args.input.display(),
        missions = %request.column_names().join(" "),
        mode = ?config.mode,
        chunk_size = config.chunk_size,
        "Starting ocean sampler"
    );

    let retriever = Arc::new(config.archive_retriever(credentials)?);
    let process = SamplerProcess::new(config, registry, request, retriever);
    let summary = process
        .run(&args.input, &args.output_dir)
        .await
        .context("Sampler run failed")?;

    info!(
        output = %summary.output.display(),
        observations = summary.observations,
        keys = summary.keys,
        rows = summary.rows_written,
        "Sampler finished"
    );
    Ok(())
}
