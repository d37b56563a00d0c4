//! End-to-end runs of the sampler process against a scripted retriever.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Timelike;
use netcdf_parser::{Dataset, NetCdfError};
use pipeline::{
    ExecutionMode, MissionRequest, PipelineConfig, PipelineError, RunSummary, SamplerProcess,
};
use retrieval::{MissionRetriever, RetrievalError, RetrievalResult, Retrieval, RetryPolicy};
use sampler_common::{MissionDescriptor, MissionRegistry, QueryPoint};
use test_utils::{
    dummy_dataset, grid_dataset, swath_dataset, temp_test_dir, unique_rows, write_input_table,
    DUPLICATE_KEY_ROWS,
};

type Behaviour =
    Box<dyn Fn(&MissionDescriptor, &QueryPoint, usize) -> RetrievalResult<Retrieval> + Send + Sync>;

/// Retriever whose answers come from a closure. Records every call and,
/// when given a watched path, the number of lines in that file at call time.
struct ScriptedRetriever {
    behaviour: Behaviour,
    calls: Mutex<Vec<(String, QueryPoint)>>,
    count: AtomicUsize,
    watched: Option<PathBuf>,
    line_counts: Mutex<Vec<usize>>,
    jitter: bool,
}

impl ScriptedRetriever {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
            watched: None,
            line_counts: Mutex::new(Vec::new()),
            jitter: false,
        }
    }

    /// Every variable of the mission holds `lat * 100 + lon` everywhere.
    fn positional() -> Self {
        Self::new(Box::new(|mission, point, _| {
            Ok(Retrieval::new(constant_grid(
                mission,
                point.latitude * 100.0 + point.longitude,
            )))
        }))
    }

    fn watching(mut self, path: PathBuf) -> Self {
        self.watched = Some(path);
        self
    }

    fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    fn calls(&self) -> Vec<(String, QueryPoint)> {
        self.calls.lock().unwrap().clone()
    }

    fn line_counts(&self) -> Vec<usize> {
        self.line_counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MissionRetriever for ScriptedRetriever {
    async fn retrieve(
        &self,
        mission: &MissionDescriptor,
        point: &QueryPoint,
        _variables: &[String],
    ) -> RetrievalResult<Retrieval> {
        if self.jitter {
            // Later minutes finish first
            let minute = point.timestamp.minute() as u64;
            tokio::time::sleep(Duration::from_millis(60 - minute)).await;
        }
        if let Some(watched) = &self.watched {
            let lines = std::fs::read_to_string(watched)
                .map(|s| s.lines().count())
                .unwrap_or(0);
            self.line_counts.lock().unwrap().push(lines);
        }
        self.calls
            .lock()
            .unwrap()
            .push((mission.name.to_string(), *point));
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        (self.behaviour)(mission, point, n)
    }
}

/// A one-cell grid holding `value` for every variable of the mission.
fn constant_grid(mission: &MissionDescriptor, value: f64) -> Dataset {
    let mut dataset = Dataset::new("scripted.nc");
    for &var in mission.variables {
        let grid = grid_dataset(var, &[0.0], &[0.0], |_, _| value);
        for name in ["lat", "lon", var] {
            if let Some(variable) = grid.variable(name) {
                dataset.insert(name, variable.clone());
            }
        }
    }
    dataset
}

fn registry() -> Arc<MissionRegistry> {
    Arc::new(MissionRegistry::standard().unwrap())
}

fn config(work: &Path) -> PipelineConfig {
    PipelineConfig {
        work_dir: work.to_path_buf(),
        task_retry: RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
        ..Default::default()
    }
}

fn process(
    config: PipelineConfig,
    request: &str,
    retriever: Arc<ScriptedRetriever>,
) -> SamplerProcess {
    let registry = registry();
    let request = MissionRequest::parse(request, &registry).unwrap();
    SamplerProcess::new(config, registry, request, retriever)
}

fn rows(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

/// Data rows of the output table, split into fields.
fn read_output(summary: &RunSummary) -> Vec<Vec<String>> {
    let contents = std::fs::read_to_string(&summary.output).unwrap();
    contents
        .lines()
        .skip(1)
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}

fn header(summary: &RunSummary) -> String {
    let contents = std::fs::read_to_string(&summary.output).unwrap();
    contents.lines().next().unwrap().to_string()
}

// ============================================================================
// Deduplication
// ============================================================================

#[tokio::test]
async fn test_duplicate_keys_share_sampled_values() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "cruise.csv", &rows(&DUPLICATE_KEY_ROWS));
    let retriever = Arc::new(ScriptedRetriever::positional());

    let summary = process(config(dir.path()), "OI-SST:sst", retriever.clone())
        .run(&input, dir.path())
        .await
        .unwrap();

    let output = read_output(&summary);
    assert_eq!(output.len(), 2);
    assert_eq!(output[0][4], "0.42");
    assert_eq!(output[1][4], "0.55");
    assert_eq!(output[0][5], output[1][5]);
    let value: f64 = output[0][5].parse().unwrap();
    assert!((value - (13.305 * 100.0 + 36.427)).abs() < 1e-6);

    // One retrieval for the shared key
    assert_eq!(retriever.calls().len(), 1);
    assert_eq!(summary.keys, 1);
    assert_eq!(summary.observations, 2);
    assert_eq!(summary.rows_written, 2);
}

#[tokio::test]
async fn test_key_fields_are_written_as_read() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "cruise.csv", &rows(&["1430,01012018,13.3,36.4,0.1"]));

    let summary = process(config(dir.path()), "OI-SST:sst", Arc::new(ScriptedRetriever::positional()))
        .run(&input, dir.path())
        .await
        .unwrap();

    let output = read_output(&summary);
    assert_eq!(&output[0][..5], ["1430", "01012018", "13.3", "36.4", "0.1"]);
    assert_eq!(summary.output, dir.path().join("cruise_output.csv"));
}

// ============================================================================
// Value resolution
// ============================================================================

#[tokio::test]
async fn test_date_outside_coverage_is_no_data_without_retrieval() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "in.csv", &rows(&[DUPLICATE_KEY_ROWS[0]]));
    let retriever = Arc::new(ScriptedRetriever::positional());

    // BO-SSW coverage ends in 2011
    let summary = process(config(dir.path()), "BO-SSW:tau BO-SSW:taux", retriever.clone())
        .run(&input, dir.path())
        .await
        .unwrap();

    let output = read_output(&summary);
    assert_eq!(&output[0][5..], ["-9999", "-9999"]);
    assert!(retriever.calls().is_empty());
}

#[tokio::test]
async fn test_coordinates_out_of_range_are_no_data() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "in.csv", &rows(&["14:30,01/01/2018,95.0,36.4,0.1"]));
    let retriever = Arc::new(ScriptedRetriever::positional());

    let summary = process(config(dir.path()), "OI-SST:sst", retriever.clone())
        .run(&input, dir.path())
        .await
        .unwrap();

    assert_eq!(read_output(&summary)[0][5], "-9999");
    assert!(retriever.calls().is_empty());
}

#[tokio::test]
async fn test_unparseable_key_keeps_its_row_as_errored() {
    let dir = temp_test_dir();
    let input = write_input_table(
        dir.path(),
        "in.csv",
        &rows(&["noon,01/01/2018,13.3,36.4,0.1", DUPLICATE_KEY_ROWS[0]]),
    );
    let retriever = Arc::new(ScriptedRetriever::positional());

    let summary = process(config(dir.path()), "OI-SST:sst PO-SST:analysed_sst", retriever.clone())
        .run(&input, dir.path())
        .await
        .unwrap();

    let output = read_output(&summary);
    assert_eq!(output.len(), 2);
    assert_eq!(output[0][0], "noon");
    assert_eq!(&output[0][5..], ["-9998", "-9998"]);
    assert_ne!(output[1][5], "-9998");
    // Only the valid key reached the retriever, once per mission
    assert_eq!(retriever.calls().len(), 2);
}

#[tokio::test]
async fn test_retrieval_fallback_is_errored() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "in.csv", &rows(&[DUPLICATE_KEY_ROWS[0]]));
    let retriever = Arc::new(ScriptedRetriever::new(Box::new(|_, _, _| {
        let mut retrieval = Retrieval::new(dummy_dataset("sst"));
        retrieval.error = Some(RetrievalError::Http {
            status: 503,
            url: "https://archive.invalid".to_string(),
        });
        Ok(retrieval)
    })));

    let summary = process(config(dir.path()), "OI-SST:sst", retriever)
        .run(&input, dir.path())
        .await
        .unwrap();

    assert_eq!(read_output(&summary)[0][5], "-9998");
}

#[tokio::test]
async fn test_nan_sample_is_no_data_and_transform_applies() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "in.csv", &rows(&[DUPLICATE_KEY_ROWS[0]]));
    let retriever = Arc::new(ScriptedRetriever::new(Box::new(|mission, _, _| {
        let value = if mission.name == "PO-SST" { 300.0 } else { f64::NAN };
        Ok(Retrieval::new(constant_grid(mission, value)))
    })));

    let summary = process(config(dir.path()), "OI-SST:sst PO-SST:analysed_sst", retriever)
        .run(&input, dir.path())
        .await
        .unwrap();

    let output = read_output(&summary);
    assert_eq!(output[0][5], "-9999");
    let celsius: f64 = output[0][6].parse().unwrap();
    assert!((celsius - 26.85).abs() < 1e-9);
}

#[tokio::test]
async fn test_swath_mission_is_geolocated() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "in.csv", &rows(&[DUPLICATE_KEY_ROWS[0]]));
    let retriever = Arc::new(ScriptedRetriever::new(Box::new(|_, _, _| {
        Ok(Retrieval::new(swath_dataset(3, 3, 13.2, 36.3, 0.1)))
    })));

    let summary = process(config(dir.path()), "MODIS-Aqua:chlor_a", retriever)
        .run(&input, dir.path())
        .await
        .unwrap();

    // (13.305, 36.427) is nearest pixel (1, 1)
    assert_eq!(read_output(&summary)[0][5], "1001");
}

#[tokio::test]
async fn test_swath_far_from_point_is_no_data() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "in.csv", &rows(&[DUPLICATE_KEY_ROWS[0]]));
    let retriever = Arc::new(ScriptedRetriever::new(Box::new(|_, _, _| {
        Ok(Retrieval::new(swath_dataset(3, 3, -40.0, 100.0, 0.1)))
    })));

    let summary = process(config(dir.path()), "MODIS-Aqua:chlor_a", retriever)
        .run(&input, dir.path())
        .await
        .unwrap();

    assert_eq!(read_output(&summary)[0][5], "-9999");
}

#[tokio::test]
async fn test_custom_sentinels() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "in.csv", &rows(&[DUPLICATE_KEY_ROWS[0]]));
    let mut config = config(dir.path());
    config.sentinels.no_data = -1.0;

    let summary = process(config, "BO-SSW:tau", Arc::new(ScriptedRetriever::positional()))
        .run(&input, dir.path())
        .await
        .unwrap();

    assert_eq!(read_output(&summary)[0][5], "-1");
}

// ============================================================================
// Columns and chunking
// ============================================================================

#[tokio::test]
async fn test_every_row_has_every_column() {
    let dir = temp_test_dir();
    let mut input_rows = unique_rows(7);
    input_rows.push("bad,01/01/2018,1,2,0.1".to_string());
    let input = write_input_table(dir.path(), "in.csv", &input_rows);
    let mut config = config(dir.path());
    config.chunk_size = 3;

    let summary = process(
        config,
        "OI-SST:sst PO-SST:analysed_sst BO-SSW:tau BO-SSW:taux",
        Arc::new(ScriptedRetriever::positional()),
    )
    .run(&input, dir.path())
    .await
    .unwrap();

    assert_eq!(
        header(&summary),
        "Time[hhmm],Date[mmddyyyy],Lat.[-90-90 deg.],Long.[0-360.E],Chl-a,\
         BO-SSW-tau,BO-SSW-taux,OI-SST-sst,PO-SST-analysed_sst"
    );
    let output = read_output(&summary);
    assert_eq!(output.len(), 8);
    assert!(output.iter().all(|row| row.len() == 9));
    assert_eq!(summary.chunks, 3);
}

#[tokio::test]
async fn test_chunks_are_appended_incrementally() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "survey.csv", &unique_rows(250));
    let output = dir.path().join("survey_output.csv");
    let retriever = Arc::new(ScriptedRetriever::positional().watching(output));

    let summary = process(config(dir.path()), "OI-SST:sst", retriever.clone())
        .run(&input, dir.path())
        .await
        .unwrap();

    assert_eq!(summary.chunks, 3);
    assert_eq!(summary.rows_written, 250);
    assert_eq!(read_output(&summary).len(), 250);

    // Line counts seen at the first retrieval of each chunk: header only,
    // then header plus each completed chunk
    let line_counts = retriever.line_counts();
    assert_eq!(line_counts.len(), 250);
    assert_eq!(line_counts[0], 1);
    assert_eq!(line_counts[100], 101);
    assert_eq!(line_counts[200], 201);
}

// ============================================================================
// Parallel execution
// ============================================================================

#[tokio::test]
async fn test_parallel_rows_follow_input_order() {
    let dir = temp_test_dir();
    let input_rows = unique_rows(12);
    let input = write_input_table(dir.path(), "in.csv", &input_rows);
    let mut config = config(dir.path());
    config.mode = ExecutionMode::Parallel;
    config.max_concurrent_keys = 6;
    config.chunk_size = 5;
    let retriever = Arc::new(ScriptedRetriever::positional().with_jitter());

    let summary = process(config, "OI-SST:sst PO-SST:analysed_sst", retriever.clone())
        .run(&input, dir.path())
        .await
        .unwrap();

    let output = read_output(&summary);
    let times: Vec<&str> = output.iter().map(|r| r[0].as_str()).collect();
    let expected: Vec<&str> = input_rows.iter().map(|r| r.split(',').next().unwrap()).collect();
    assert_eq!(times, expected);
    assert_eq!(retriever.calls().len(), 24);
}

#[tokio::test]
async fn test_parallel_matches_sequential() {
    let dir = temp_test_dir();
    let seq_dir = dir.path().join("seq");
    let par_dir = dir.path().join("par");
    std::fs::create_dir_all(&seq_dir).unwrap();
    std::fs::create_dir_all(&par_dir).unwrap();
    let mut input_rows = unique_rows(9);
    input_rows.push(DUPLICATE_KEY_ROWS[0].to_string());
    input_rows.push(DUPLICATE_KEY_ROWS[1].to_string());
    let input = write_input_table(dir.path(), "in.csv", &input_rows);
    let request = "OI-SST:sst BO-SSW:tau PO-SST:analysed_sst";

    let sequential = process(config(dir.path()), request, Arc::new(ScriptedRetriever::positional()))
        .run(&input, &seq_dir)
        .await
        .unwrap();

    let mut parallel_config = config(dir.path());
    parallel_config.mode = ExecutionMode::Parallel;
    let parallel = process(
        parallel_config,
        request,
        Arc::new(ScriptedRetriever::positional().with_jitter()),
    )
    .run(&input, &par_dir)
    .await
    .unwrap();

    assert_eq!(
        std::fs::read_to_string(&sequential.output).unwrap(),
        std::fs::read_to_string(&parallel.output).unwrap()
    );
}

// ============================================================================
// Retries and fatal failures
// ============================================================================

fn dummy_unavailable() -> RetrievalError {
    RetrievalError::Dataset(NetCdfError::DummyUnavailable {
        mission: "OI-SST".to_string(),
        path: "/nonexistent/OISST.nc".into(),
        source: Box::new(NetCdfError::MissingData("gone".to_string())),
    })
}

#[tokio::test]
async fn test_transient_task_failure_is_retried() {
    let dir = temp_test_dir();
    let input = write_input_table(dir.path(), "in.csv", &rows(&[DUPLICATE_KEY_ROWS[0]]));
    let retriever = Arc::new(ScriptedRetriever::new(Box::new(|mission, _, n| {
        if n < 2 {
            Err(dummy_unavailable())
        } else {
            Ok(Retrieval::new(constant_grid(mission, 12.5)))
        }
    })));

    let summary = process(config(dir.path()), "OI-SST:sst", retriever.clone())
        .run(&input, dir.path())
        .await
        .unwrap();

    assert_eq!(read_output(&summary)[0][5], "12.5");
    assert_eq!(retriever.calls().len(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_abort_the_run() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let dir = temp_test_dir();
        let input = write_input_table(dir.path(), "in.csv", &rows(&[DUPLICATE_KEY_ROWS[0]]));
        let retriever = Arc::new(ScriptedRetriever::new(Box::new(|_, _, _| {
            Err(dummy_unavailable())
        })));
        let mut config = config(dir.path());
        config.mode = mode;

        let err = process(config, "OI-SST:sst", retriever.clone())
            .run(&input, dir.path())
            .await
            .unwrap_err();

        match err {
            PipelineError::TaskExhausted {
                mission, attempts, ..
            } => {
                assert_eq!(mission, "OI-SST");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error in {:?} mode: {}", mode, other),
        }
        assert_eq!(retriever.calls().len(), 3);
    }
}

#[tokio::test]
async fn test_missing_input_is_fatal() {
    let dir = temp_test_dir();
    let err = process(config(dir.path()), "OI-SST:sst", Arc::new(ScriptedRetriever::positional()))
        .run(&dir.path().join("absent.csv"), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Input { .. }));
}

// ============================================================================
// Cleanup
// ============================================================================

#[tokio::test]
async fn test_residual_temporary_files_are_removed() {
    let dir = temp_test_dir();
    let work = tempfile::tempdir().unwrap();
    std::fs::write(work.path().join("sampler-0123-granule.nc"), b"stale").unwrap();
    std::fs::write(work.path().join("notes.txt"), b"keep").unwrap();
    let input = write_input_table(dir.path(), "in.csv", &rows(&[DUPLICATE_KEY_ROWS[0]]));

    let summary = process(config(work.path()), "OI-SST:sst", Arc::new(ScriptedRetriever::positional()))
        .run(&input, dir.path())
        .await
        .unwrap();

    assert_eq!(summary.residual_removed, 1);
    assert!(!work.path().join("sampler-0123-granule.nc").exists());
    assert!(work.path().join("notes.txt").exists());
}
