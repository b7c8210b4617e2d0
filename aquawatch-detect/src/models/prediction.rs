//! Per-run results returned to callers
//!
//! Nothing here is persisted by the pipeline itself.

use serde::Serialize;

use crate::types::Granularity;

/// Which rung of the fetch ladder produced the data a result was computed from
///
/// `Canned` means the embedded placeholder document was used because every
/// provider request failed; results built on it are not real measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Daily30d,
    Instantaneous,
    Canned,
}

impl DataOrigin {
    /// Provider granularity to request, `None` for the embedded document
    pub fn granularity(self) -> Option<Granularity> {
        match self {
            DataOrigin::Daily30d => Some(Granularity::Daily30d),
            DataOrigin::Instantaneous => Some(Granularity::Instantaneous),
            DataOrigin::Canned => None,
        }
    }

    pub fn is_canned(self) -> bool {
        self == DataOrigin::Canned
    }
}

impl std::fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataOrigin::Daily30d => write!(f, "daily30d"),
            DataOrigin::Instantaneous => write!(f, "instantaneous"),
            DataOrigin::Canned => write!(f, "canned"),
        }
    }
}

/// Outcome of one fetch → encode → infer → decide run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Key the dataset snapshot was (or would have been) stored under
    pub dataset_key: String,
    /// Rounded to 2 decimals
    pub observed_value: f64,
    /// Rounded to 2 decimals
    pub predicted_value: f64,
    /// Computed from the unrounded values
    pub percent_change: f64,
    pub anomalous: bool,
    pub data_origin: DataOrigin,
}

/// One successful site in a batch check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteDetection {
    pub site: String,
    #[serde(flatten)]
    pub result: PredictionResult,
    /// Empty unless anomalous
    pub anomalous_reason: String,
}

/// One failed site in a batch check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteFailure {
    pub site: String,
    pub error: String,
}

/// Partial-success report for a batch check
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchDetection {
    pub items: Vec<SiteDetection>,
    pub failures: Vec<SiteFailure>,
}

impl BatchDetection {
    pub fn anomalous(&self) -> impl Iterator<Item = &SiteDetection> {
        self.items.iter().filter(|item| item.result.anomalous)
    }
}

/// Outcome of a preprocess (fetch + encode + accumulate) run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessOutcome {
    pub processed_key: String,
    /// Size of the whole dataset after the append
    pub bytes: usize,
    /// Rows appended by this run
    pub rows: usize,
    pub data_origin: DataOrigin,
}
