//! Parsed observations and the feature-row wire encoding
//!
//! The feature-row text format is shared with stored datasets and trained
//! models, so it must not drift:
//!
//! ```text
//! label,timestamp_unix,latitude,longitude,weather_temperature
//! 72.300000,1756052100,40.101083,-87.597611,81
//! ```
//!
//! No header, no quoting, six-decimal floats, integer timestamp and temperature.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One reported instant for one site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub site_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// One training/inference record
///
/// `label_value` is the observed value; the remaining four fields are the
/// model's features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub label_value: f64,
    pub timestamp_epoch_seconds: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub weather_temperature: i64,
}

impl FeatureRow {
    pub fn from_observation(observation: &Observation, weather_temperature: i64) -> Self {
        Self {
            label_value: observation.value,
            timestamp_epoch_seconds: observation.timestamp.timestamp(),
            latitude: observation.latitude,
            longitude: observation.longitude,
            weather_temperature,
        }
    }

    /// Encode as one CSV line, without the trailing newline
    pub fn to_csv_line(&self) -> String {
        format!(
            "{:.6},{},{:.6},{:.6},{}",
            self.label_value,
            self.timestamp_epoch_seconds,
            self.latitude,
            self.longitude,
            self.weather_temperature
        )
    }
}

/// Encode rows as newline-terminated CSV lines
pub fn rows_to_csv(rows: &[FeatureRow]) -> String {
    let mut out = String::with_capacity(rows.len() * 48);
    for row in rows {
        out.push_str(&row.to_csv_line());
        out.push('\n');
    }
    out
}
