//! Naming of the work directory and the temporary files inside it.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Prefix shared by every temporary file the sampler creates.
pub const TEMP_PREFIX: &str = "sampler-";

/// Prefix of the per-run work directories under the system temporary
/// directory.
pub const RUN_DIR_PREFIX: &str = "sampler-run-";

/// Default work directory: a subdirectory of the system temporary directory
/// owned by this run alone, so cleanup never touches another run's files.
pub fn run_work_dir() -> PathBuf {
    std::env::temp_dir().join(format!("{}{}", RUN_DIR_PREFIX, Uuid::new_v4().simple()))
}

pub fn is_run_work_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(RUN_DIR_PREFIX))
        .unwrap_or(false)
}

/// A fresh path in `dir` ending in `file_name`.
///
/// Concurrent tasks fetching the same granule never share a path.
pub fn scratch_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(format!(
        "{}{}-{}",
        TEMP_PREFIX,
        Uuid::new_v4().simple(),
        file_name
    ))
}

pub fn is_scratch_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(TEMP_PREFIX))
        .unwrap_or(false)
}
