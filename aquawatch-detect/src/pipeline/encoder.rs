//! Feature encoding of provider documents
//!
//! One pass over a document yields both the feature rows (document order) and
//! the latest observation used by the decider.
//!
//! Point-level leniency is kept for compatibility with already-trained models:
//! - a point whose timestamp is not RFC 3339 is dropped
//! - a point whose value has no leading decimal number encodes as 0.0
//!
//! Both are logged at WARN so corrupted inputs stay visible.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::DetectError;
use crate::models::observation::rows_to_csv;
use crate::models::{FeatureRow, Observation, TimeSeries, ValuePoint, WaterDocument};
use crate::types::{RawDocument, WeatherLookup};

/// Rows and latest observation of one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedDocument {
    pub rows: Vec<FeatureRow>,
    /// Latest-by-timestamp point of the first series with a usable point
    pub latest: Option<Observation>,
}

impl EncodedDocument {
    pub fn to_csv(&self) -> String {
        rows_to_csv(&self.rows)
    }
}

/// Concatenated rows of several documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedBatch {
    pub csv: String,
    pub rows: usize,
}

pub struct FeatureEncoder {
    weather: Arc<dyn WeatherLookup>,
}

impl FeatureEncoder {
    pub fn new(weather: Arc<dyn WeatherLookup>) -> Self {
        Self { weather }
    }

    /// Encode one raw document
    ///
    /// Weather is looked up once per series, before its points are read.
    pub async fn encode(&self, document: &RawDocument) -> Result<EncodedDocument, DetectError> {
        let parsed: WaterDocument = serde_json::from_slice(document.as_bytes())
            .map_err(|e| DetectError::Parse(format!("time-series document: {}", e)))?;

        let mut encoded = EncodedDocument::default();

        for series in &parsed.value.time_series {
            let temperature = self
                .temperature_at(series.latitude(), series.longitude())
                .await;

            let mut series_latest: Option<Observation> = None;

            for point in series.points() {
                let Some(observation) = parse_point(series, point) else {
                    continue;
                };

                encoded
                    .rows
                    .push(FeatureRow::from_observation(&observation, temperature));

                let newer = series_latest
                    .as_ref()
                    .map_or(true, |current| observation.timestamp > current.timestamp);
                if newer {
                    series_latest = Some(observation);
                }
            }

            if encoded.latest.is_none() {
                encoded.latest = series_latest;
            }
        }

        debug!(
            series = parsed.value.time_series.len(),
            rows = encoded.rows.len(),
            "Encoded time-series document"
        );
        Ok(encoded)
    }

    /// Encode each present document and concatenate the row blocks
    ///
    /// Absent slots (blank site ids) and zero-length payloads contribute nothing.
    pub async fn encode_batch(
        &self,
        documents: &[Option<RawDocument>],
    ) -> Result<EncodedBatch, DetectError> {
        let mut batch = EncodedBatch::default();

        for (index, document) in documents.iter().enumerate() {
            let Some(document) = document else {
                continue;
            };
            if document.is_empty() {
                debug!(index, "Empty payload, skipping");
                continue;
            }
            let encoded = self.encode(document).await?;
            batch.rows += encoded.rows.len();
            // Every block is newline-terminated, so plain concatenation keeps
            // exactly one newline between blocks
            batch.csv.push_str(&encoded.to_csv());
        }

        Ok(batch)
    }

    async fn temperature_at(&self, latitude: f64, longitude: f64) -> i64 {
        match self.weather.fetch_weather(latitude, longitude).await {
            Ok(reading) => reading.temperature,
            Err(e) => {
                warn!(latitude, longitude, error = %e, "Weather lookup failed, using temperature 0");
                0
            }
        }
    }
}

fn parse_point(series: &TimeSeries, point: &ValuePoint) -> Option<Observation> {
    let timestamp = match DateTime::parse_from_rfc3339(&point.date_time) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            warn!(
                site_id = series.site_id(),
                date_time = %point.date_time,
                error = %e,
                "Skipping point with unparseable timestamp"
            );
            return None;
        }
    };

    let value = scan_leading_float(&point.value).unwrap_or_else(|| {
        warn!(
            site_id = series.site_id(),
            value = %point.value,
            "Point value is not numeric, encoding as 0"
        );
        0.0
    });

    Some(Observation {
        site_id: series.site_id().to_string(),
        timestamp,
        value,
        unit: series.unit().to_string(),
        latitude: series.latitude(),
        longitude: series.longitude(),
    })
}

/// Parse the longest decimal number at the start of `input`
///
/// Leading whitespace is skipped and trailing garbage ignored, so `"72.3 ft"`
/// reads as 72.3. An exponent is only consumed when digits follow it.
pub fn scan_leading_float(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let len = bytes.len();
    let digits_from = |mut at: usize| {
        while at < len && bytes[at].is_ascii_digit() {
            at += 1;
        }
        at
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let int_end = digits_from(end);
    let mut digit_count = int_end - end;
    end = int_end;

    if end < len && bytes[end] == b'.' {
        let frac_end = digits_from(end + 1);
        digit_count += frac_end - (end + 1);
        end = frac_end;
    }

    if digit_count == 0 {
        return None;
    }

    if end < len && matches!(bytes[end], b'e' | b'E') {
        let mut exp_at = end + 1;
        if exp_at < len && matches!(bytes[exp_at], b'+' | b'-') {
            exp_at += 1;
        }
        let exp_end = digits_from(exp_at);
        if exp_end > exp_at {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::canned_document;
    use crate::types::{WeatherError, WeatherReading};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedWeather {
        temperature: Option<i64>,
        calls: AtomicUsize,
    }

    impl FixedWeather {
        fn new(temperature: Option<i64>) -> Arc<Self> {
            Arc::new(Self {
                temperature,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl WeatherLookup for FixedWeather {
        async fn fetch_weather(&self, _lat: f64, _lon: f64) -> Result<WeatherReading, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.temperature {
                Some(temperature) => Ok(WeatherReading {
                    temperature,
                    unit: "F".to_string(),
                    wind_speed: "5 mph".to_string(),
                    wind_direction: "S".to_string(),
                }),
                None => Err(WeatherError::NoPeriods),
            }
        }
    }

    fn document(series: &[(&str, &[(&str, &str)])]) -> RawDocument {
        let series: Vec<serde_json::Value> = series
            .iter()
            .map(|(site, points)| {
                let points: Vec<serde_json::Value> = points
                    .iter()
                    .map(|(value, ts)| serde_json::json!({"value": value, "dateTime": ts}))
                    .collect();
                serde_json::json!({
                    "sourceInfo": {
                        "siteCode": [{"value": site}],
                        "geoLocation": {"geogLocation": {"latitude": 40.5, "longitude": -88.25}}
                    },
                    "variable": {"unit": {"unitCode": "ft3/s"}},
                    "values": [{"value": points}]
                })
            })
            .collect();
        RawDocument::new(
            serde_json::json!({"value": {"timeSeries": series}})
                .to_string()
                .into_bytes(),
        )
    }

    #[tokio::test]
    async fn test_canned_document_encodes_one_row() {
        let encoder = FeatureEncoder::new(FixedWeather::new(Some(81)));

        let encoded = encoder.encode(&canned_document()).await.unwrap();

        assert_eq!(
            encoded.to_csv(),
            "72.300000,1756052100,40.101083,-87.597611,81\n"
        );
        let latest = encoded.latest.unwrap();
        assert_eq!(latest.site_id, "03339000");
        assert_eq!(latest.value, 72.3);
    }

    #[tokio::test]
    async fn test_bad_timestamp_dropped_bad_value_zeroed() {
        let encoder = FeatureEncoder::new(FixedWeather::new(Some(70)));
        let doc = document(&[(
            "A",
            &[
                ("10.5", "2025-08-01T00:00:00Z"),
                ("11", "2025-08-01"),
                ("Ice", "2025-08-02T00:00:00Z"),
            ],
        )]);

        let encoded = encoder.encode(&doc).await.unwrap();

        assert_eq!(encoded.rows.len(), 2);
        assert_eq!(encoded.rows[0].label_value, 10.5);
        assert_eq!(encoded.rows[1].label_value, 0.0);
    }

    #[tokio::test]
    async fn test_weather_called_once_per_series() {
        let weather = FixedWeather::new(Some(60));
        let encoder = FeatureEncoder::new(weather.clone());
        let doc = document(&[
            (
                "A",
                &[("1", "2025-08-01T00:00:00Z"), ("2", "2025-08-02T00:00:00Z")],
            ),
            ("B", &[]),
        ]);

        encoder.encode(&doc).await.unwrap();

        assert_eq!(weather.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_weather_failure_encodes_zero_temperature() {
        let encoder = FeatureEncoder::new(FixedWeather::new(None));
        let doc = document(&[("A", &[("3.25", "2025-08-01T00:00:00Z")])]);

        let encoded = encoder.encode(&doc).await.unwrap();

        assert_eq!(encoded.rows[0].weather_temperature, 0);
        assert!(encoded.to_csv().ends_with(",0\n"));
    }

    #[tokio::test]
    async fn test_latest_is_max_timestamp_of_first_usable_series() {
        let encoder = FeatureEncoder::new(FixedWeather::new(Some(50)));
        let doc = document(&[
            ("EMPTY", &[("9", "not-a-time")]),
            (
                "A",
                &[
                    ("1", "2025-08-02T00:00:00Z"),
                    ("2", "2025-08-03T00:00:00Z"),
                    ("3", "2025-08-01T00:00:00Z"),
                    ("4", "2025-08-03T00:00:00Z"),
                ],
            ),
            ("B", &[("99", "2025-09-01T00:00:00Z")]),
        ]);

        let encoded = encoder.encode(&doc).await.unwrap();

        // Row order follows the document, not time
        let labels: Vec<f64> = encoded.rows.iter().map(|r| r.label_value).collect();
        assert_eq!(labels, vec![1.0, 2.0, 3.0, 4.0, 99.0]);

        // Ties keep the earlier point
        let latest = encoded.latest.unwrap();
        assert_eq!(latest.site_id, "A");
        assert_eq!(latest.value, 2.0);
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let encoder = FeatureEncoder::new(FixedWeather::new(Some(50)));
        let result = encoder.encode(&RawDocument::new("<html>")).await;
        assert!(matches!(result, Err(DetectError::Parse(_))));
    }

    #[tokio::test]
    async fn test_encode_batch_skips_absent_and_joins_blocks() {
        let encoder = FeatureEncoder::new(FixedWeather::new(Some(1)));
        let a = document(&[("A", &[("1", "2025-08-01T00:00:00Z")])]);
        let empty = document(&[("E", &[])]);
        let b = document(&[
            (
                "B",
                &[("2", "2025-08-01T00:00:00Z"), ("3", "2025-08-02T00:00:00Z")],
            ),
        ]);

        let batch = encoder
            .encode_batch(&[Some(a), None, Some(empty), Some(b)])
            .await
            .unwrap();

        assert_eq!(batch.rows, 3);
        assert_eq!(batch.csv.lines().count(), 3);
        assert!(!batch.csv.starts_with('\n'));
        assert!(!batch.csv.contains("\n\n"));
        assert!(batch.csv.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_null_value_encodes_as_zero() {
        let encoder = FeatureEncoder::new(FixedWeather::new(Some(70)));
        let doc = RawDocument::new(
            r#"{"value":{"timeSeries":[{"sourceInfo":{"siteCode":[{"value":"A"}]},
                "values":[{"value":[
                    {"value":null,"dateTime":"2025-08-01T00:00:00Z"},
                    {"value":"4.5","dateTime":"2025-08-02T00:00:00Z"}
                ]}]}]}}"#,
        );

        let encoded = encoder.encode(&doc).await.unwrap();

        let labels: Vec<f64> = encoded.rows.iter().map(|r| r.label_value).collect();
        assert_eq!(labels, vec![0.0, 4.5]);
        assert_eq!(encoded.latest.unwrap().value, 4.5);
    }

    #[tokio::test]
    async fn test_null_timestamp_skips_only_that_point() {
        let encoder = FeatureEncoder::new(FixedWeather::new(Some(70)));
        let doc = RawDocument::new(
            r#"{"value":{"timeSeries":[{"sourceInfo":{"siteCode":[{"value":"A"}]},
                "values":[{"value":[
                    {"value":"1.0","dateTime":null},
                    {"value":"2.0","dateTime":"2025-08-02T00:00:00Z"}
                ]}]}]}}"#,
        );

        let encoded = encoder.encode(&doc).await.unwrap();

        assert_eq!(encoded.rows.len(), 1);
        assert_eq!(encoded.rows[0].label_value, 2.0);
    }

    #[tokio::test]
    async fn test_encode_batch_skips_empty_payload() {
        let encoder = FeatureEncoder::new(FixedWeather::new(Some(1)));
        let a = document(&[("A", &[("1", "2025-08-01T00:00:00Z")])]);

        let batch = encoder
            .encode_batch(&[Some(RawDocument::new(Vec::new())), Some(a)])
            .await
            .unwrap();

        assert_eq!(batch.rows, 1);
        assert_eq!(batch.csv, "1.000000,1754006400,40.500000,-88.250000,1\n");
    }

    #[test]
    fn test_scan_leading_float() {
        assert_eq!(scan_leading_float("72.3"), Some(72.3));
        assert_eq!(scan_leading_float("  -4.5"), Some(-4.5));
        assert_eq!(scan_leading_float("+7"), Some(7.0));
        assert_eq!(scan_leading_float(".5"), Some(0.5));
        assert_eq!(scan_leading_float("5."), Some(5.0));
        assert_eq!(scan_leading_float("12.5ft"), Some(12.5));
        assert_eq!(scan_leading_float("1e3"), Some(1000.0));
        assert_eq!(scan_leading_float("2e"), Some(2.0));
        assert_eq!(scan_leading_float("3E-2x"), Some(0.03));
        assert_eq!(scan_leading_float("-999999"), Some(-999999.0));
    }

    #[test]
    fn test_scan_leading_float_rejects_non_numbers() {
        assert_eq!(scan_leading_float(""), None);
        assert_eq!(scan_leading_float("Ice"), None);
        assert_eq!(scan_leading_float("-"), None);
        assert_eq!(scan_leading_float("."), None);
        assert_eq!(scan_leading_float("e5"), None);
    }
}
