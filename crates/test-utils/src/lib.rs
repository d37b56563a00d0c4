//! Test helpers shared across the sampler crates.
//!
//! Synthetic swath and grid datasets, observation tables, a local HTTP
//! server standing in for the archives, and lookup of the large dummy
//! datasets that are installed outside the repository.

pub mod fixtures;
pub mod generators;
pub mod http;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use http::{RecordedRequest, StubResponse, StubServer};
pub use paths::*;

/// Resolve an installed dataset by file name, or return early from the
/// calling test with a skip message when it is not present.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Set SAMPLER_DATASET_DIR or TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Assert two sampled values agree within `epsilon`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
