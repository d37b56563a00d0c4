//! Removal of temporary files left in the work directory.

use std::path::Path;

use retrieval::{is_run_work_dir, is_scratch_file};
use tracing::{debug, warn};

/// Delete every scratch file directly inside `work_dir`.
///
/// Failures are logged and skipped. Returns the number of files removed.
pub fn remove_residual(work_dir: &Path) -> usize {
    let mut removed = 0;

    for entry in walkdir::WalkDir::new(work_dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %work_dir.display(), error = %e, "Failed to scan work directory");
                continue;
            }
        };

        if entry.file_type().is_file() && is_scratch_file(entry.path()) {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!(path = %entry.path().display(), "Removed residual file");
                    removed += 1;
                }
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to remove residual file")
                }
            }
        }
    }

    removed
}

/// Remove `work_dir` itself when it is an emptied per-run directory.
///
/// Directories chosen by the user are always kept.
pub fn remove_run_dir(work_dir: &Path) -> bool {
    if !is_run_work_dir(work_dir) {
        return false;
    }
    match std::fs::remove_dir(work_dir) {
        Ok(()) => {
            debug!(dir = %work_dir.display(), "Removed run work directory");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(dir = %work_dir.display(), error = %e, "Failed to remove run work directory");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_scratch_files_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sampler-abc-granule.nc"), b"x").unwrap();
        std::fs::write(dir.path().join("sampler-def-granule.nc.partial"), b"x").unwrap();
        std::fs::write(dir.path().join("keep.nc"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sampler-nested")).unwrap();
        std::fs::write(dir.path().join("sampler-nested/sampler-inner.nc"), b"x").unwrap();

        assert_eq!(remove_residual(dir.path()), 2);

        assert!(dir.path().join("keep.nc").exists());
        assert!(dir.path().join("sampler-nested/sampler-inner.nc").exists());
        assert!(!dir.path().join("sampler-abc-granule.nc").exists());
    }

    #[test]
    fn test_emptied_run_dir_is_removed() {
        let parent = tempfile::tempdir().unwrap();
        let run = parent.path().join("sampler-run-0123abcd");
        std::fs::create_dir(&run).unwrap();
        std::fs::write(run.join("sampler-abc-granule.nc"), b"x").unwrap();

        assert_eq!(remove_residual(&run), 1);
        assert!(remove_run_dir(&run));
        assert!(!run.exists());
    }

    #[test]
    fn test_user_work_dir_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!remove_run_dir(dir.path()));
        assert!(dir.path().exists());

        let run = dir.path().join("sampler-run-0123abcd");
        std::fs::create_dir(&run).unwrap();
        std::fs::write(run.join("output.csv"), b"x").unwrap();
        // Not empty, so it stays
        assert!(!remove_run_dir(&run));
        assert!(run.join("output.csv").exists());
    }

    #[test]
    fn test_missing_directory_removes_nothing() {
        assert_eq!(remove_residual(Path::new("/nonexistent/work")), 0);
    }
}
