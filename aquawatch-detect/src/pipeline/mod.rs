//! Fetch → encode → accumulate → infer → decide
//!
//! Stages, leaves first:
//! - [`source`] - raw documents per site with the daily/instantaneous/canned ladder
//! - [`encoder`] - feature rows and latest observation from one document
//! - [`accumulator`] - byte-level dataset append in the blob store
//! - [`inference`] - label stripping, endpoint call, prediction parsing
//! - [`decider`] - percent change and threshold/floor classification
//! - [`orchestrator`] - the stages wired together

pub mod accumulator;
pub mod decider;
pub mod encoder;
pub mod inference;
pub mod orchestrator;
pub mod source;

pub use accumulator::{append_dataset, DatasetAccumulator};
pub use decider::{percent_change, AnomalyDecider, Decision};
pub use encoder::{EncodedBatch, EncodedDocument, FeatureEncoder};
pub use inference::{parse_predictions, strip_label_column, InferenceClient};
pub use orchestrator::{
    compose_alert, Collaborators, Detector, DetectorSettings, ANOMALY_REASON,
    DEFAULT_PARAMETER_CODE, MAX_BATCH_SITES,
};
pub use source::{canned_document, SourcedBatch, TimeSeriesSource, FULL_LADDER, LATEST_LADDER};
