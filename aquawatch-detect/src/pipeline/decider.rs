//! Observed-vs-predicted anomaly classification

use aquawatch_common::config::AnomalyConfig;

/// Smallest denominator used for the percent change
pub const OBSERVED_EPSILON: f64 = 1e-9;

/// `|predicted - observed| / max(epsilon, |observed|) * 100`
///
/// Normalized by the observed magnitude, so swapping the arguments changes
/// the result.
pub fn percent_change(observed: f64, predicted: f64) -> f64 {
    (predicted - observed).abs() / observed.abs().max(OBSERVED_EPSILON) * 100.0
}

/// Round half away from zero to 2 decimals, for presentation only
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Classification of one observed/predicted pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Rounded to 2 decimals
    pub observed_value: f64,
    /// Rounded to 2 decimals
    pub predicted_value: f64,
    pub percent_change: f64,
    pub anomalous: bool,
}

/// Threshold/floor policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyDecider {
    threshold_percent: f64,
    minimum_floor: f64,
}

impl AnomalyDecider {
    pub fn new(threshold_percent: f64, minimum_floor: f64) -> Self {
        Self {
            threshold_percent,
            minimum_floor,
        }
    }

    pub fn from_config(config: &AnomalyConfig) -> Self {
        Self::new(config.threshold_percent, config.minimum_floor)
    }

    /// Same floor, different threshold
    pub fn with_threshold(self, threshold_percent: f64) -> Self {
        Self {
            threshold_percent,
            ..self
        }
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    pub fn minimum_floor(&self) -> f64 {
        self.minimum_floor
    }

    /// Anomalous when the change exceeds the threshold and the prediction
    /// is above the floor
    pub fn decide(&self, observed: f64, predicted: f64) -> Decision {
        let pct = percent_change(observed, predicted);
        Decision {
            observed_value: round2(observed),
            predicted_value: round2(predicted),
            percent_change: pct,
            anomalous: pct > self.threshold_percent && predicted > self.minimum_floor,
        }
    }
}

impl Default for AnomalyDecider {
    fn default() -> Self {
        Self::from_config(&AnomalyConfig::default())
    }
}
