//! Data models for aquawatch-detect
//!
//! - Provider document shape (WaterML-style JSON)
//! - Parsed observations and their feature-row encoding
//! - Per-run results returned to callers

pub mod observation;
pub mod prediction;
pub mod water_document;

pub use observation::{FeatureRow, Observation};
pub use prediction::{
    BatchDetection, DataOrigin, PredictionResult, PreprocessOutcome, SiteDetection, SiteFailure,
};
pub use water_document::{TimeSeries, ValuePoint, WaterDocument};
