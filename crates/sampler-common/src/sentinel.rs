//! Sentinel values written in place of samples that could not be produced.

use serde::{Deserialize, Serialize};

pub const DEFAULT_NO_DATA: f64 = -9999.0;
pub const DEFAULT_ERRORED_DATA: f64 = -9998.0;

/// The pair of values substituted for missing samples.
///
/// `no_data` marks "no valid observation exists" (out of window, masked,
/// outside mission coverage). `errored` marks a retrieval or extraction
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentinels {
    #[serde(default = "default_no_data")]
    pub no_data: f64,
    #[serde(default = "default_errored", alias = "errored_data")]
    pub errored: f64,
}

fn default_no_data() -> f64 {
    DEFAULT_NO_DATA
}

fn default_errored() -> f64 {
    DEFAULT_ERRORED_DATA
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            no_data: DEFAULT_NO_DATA,
            errored: DEFAULT_ERRORED_DATA,
        }
    }
}

impl Sentinels {
    pub fn new(no_data: f64, errored: f64) -> Self {
        Self { no_data, errored }
    }

    /// True if `value` is one of the two sentinels.
    pub fn is_sentinel(&self, value: f64) -> bool {
        value == self.no_data || value == self.errored
    }
}
