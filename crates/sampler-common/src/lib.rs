//! Common types shared across the ocean sampler crates.
//!
//! The [`MissionRegistry`] is the single source of truth for which missions
//! exist, which variables they expose, and how their archives are reached.
//! Everything else in the workspace consults it for validation and dispatch.

pub mod bbox;
pub mod catalog;
pub mod error;
pub mod mission;
pub mod observation;
pub mod registry;
pub mod sentinel;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{ConfigError, ConfigResult, ObservationError, RangeWarning};
pub use mission::{
    Archive, DataLayout, DateCoverage, LonConvention, MissionDescriptor, UrlTemplate,
    ValueTransform,
};
pub use observation::{GroupKey, Observation, QueryPoint};
pub use registry::MissionRegistry;
pub use sentinel::Sentinels;
pub use time::{TemporalWindow, CATALOG_TIME_FORMAT};
