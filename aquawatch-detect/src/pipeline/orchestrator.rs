//! Pipeline orchestration
//!
//! [`Detector`] owns the five pipeline stages and drives them for the two core
//! operations plus the batch entry points used by the HTTP surface:
//!
//! - [`Detector::process_infer_and_detect`] - one site, fetch → encode → persist → infer → decide
//! - [`Detector::encode_and_accumulate`] - documents → rows appended to a stored dataset
//! - [`Detector::detect_sites`] - up to [`MAX_BATCH_SITES`] sites, partial success, alerting
//! - [`Detector::preprocess_sites`] - fetch + encode + accumulate for a station list
//! - [`Detector::infer_dataset`] - prediction over a stored dataset
//!
//! Hard failures abort the run for the affected site. Weather lookup,
//! snapshot persistence and alert publication are best-effort.

use std::sync::Arc;

use aquawatch_common::config::{AnomalyConfig, TomlConfig};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::accumulator::DatasetAccumulator;
use super::decider::AnomalyDecider;
use super::encoder::FeatureEncoder;
use super::inference::InferenceClient;
use super::source::{TimeSeriesSource, LATEST_LADDER};
use crate::error::DetectError;
use crate::models::{
    BatchDetection, PredictionResult, PreprocessOutcome, SiteDetection, SiteFailure,
};
use crate::services::{
    FsBlobStore, HttpModelInvoker, LogAlertPublisher, MemoryBlobStore, NwsWeatherClient,
    UsgsClient, WebhookAlertPublisher,
};
use crate::types::{
    AlertPublisher, BlobStore, ModelInvoker, RawDocument, TimeSeriesProvider, WeatherLookup,
};

/// Parameter used when a caller sends none (discharge, ft3/s)
pub const DEFAULT_PARAMETER_CODE: &str = "00060";

/// Largest site list accepted by one batch check
pub const MAX_BATCH_SITES: usize = 10;

/// Reason attached to anomalous batch items
pub const ANOMALY_REASON: &str = "high discharge";

/// External services the pipeline calls
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn TimeSeriesProvider>,
    pub weather: Arc<dyn WeatherLookup>,
    pub store: Arc<dyn BlobStore>,
    pub invoker: Arc<dyn ModelInvoker>,
    pub alerts: Arc<dyn AlertPublisher>,
}

/// Pipeline settings taken from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub endpoint: Option<String>,
    pub target_model: Option<String>,
    pub anomaly: AnomalyConfig,
    /// Bound on concurrent provider requests and concurrent site pipelines
    pub max_concurrency: usize,
    /// Save single-site snapshots; off when no data folder is configured
    pub persist_snapshots: bool,
}

impl DetectorSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            endpoint: config.inference.endpoint.clone(),
            target_model: config.inference.target_model.clone(),
            anomaly: config.anomaly,
            max_concurrency: config.usgs.max_concurrency,
            persist_snapshots: config.storage.data_folder.is_some(),
        }
    }
}

pub struct Detector {
    source: TimeSeriesSource,
    encoder: FeatureEncoder,
    accumulator: DatasetAccumulator,
    inference: InferenceClient,
    decider: AnomalyDecider,
    alerts: Arc<dyn AlertPublisher>,
    max_concurrency: usize,
    persist_snapshots: bool,
}

impl Detector {
    pub fn new(collaborators: Collaborators, settings: DetectorSettings) -> Self {
        let max_concurrency = settings.max_concurrency.max(1);
        Self {
            source: TimeSeriesSource::new(collaborators.provider, max_concurrency),
            encoder: FeatureEncoder::new(collaborators.weather),
            accumulator: DatasetAccumulator::new(collaborators.store),
            inference: InferenceClient::new(
                collaborators.invoker,
                settings.endpoint,
                settings.target_model,
            ),
            decider: AnomalyDecider::from_config(&settings.anomaly),
            alerts: collaborators.alerts,
            max_concurrency,
            persist_snapshots: settings.persist_snapshots,
        }
    }

    /// Build the production pipeline: HTTP clients, and a filesystem blob
    /// store when a data folder is configured (in-memory otherwise, with
    /// single-site snapshots switched off)
    pub fn from_config(config: &TomlConfig) -> Result<Self, DetectError> {
        let provider = UsgsClient::new(&config.usgs)
            .map_err(|e| DetectError::Configuration(format!("USGS client: {}", e)))?;
        let weather = NwsWeatherClient::new(&config.weather)
            .map_err(|e| DetectError::Configuration(format!("weather client: {}", e)))?;
        let invoker = HttpModelInvoker::new(&config.inference)
            .map_err(|e| DetectError::Configuration(format!("model invoker: {}", e)))?;

        let store: Arc<dyn BlobStore> = match &config.storage.data_folder {
            Some(folder) => {
                info!(folder = %folder.display(), "Datasets stored on filesystem");
                Arc::new(FsBlobStore::new(folder))
            }
            None => {
                warn!("No data folder configured, datasets are kept in memory and snapshots are not saved");
                Arc::new(MemoryBlobStore::new())
            }
        };

        let alerts: Arc<dyn AlertPublisher> = match &config.alerts.webhook_url {
            Some(url) => Arc::new(
                WebhookAlertPublisher::new(url.clone(), config.weather.timeout())
                    .map_err(|e| DetectError::Configuration(format!("alert webhook: {}", e)))?,
            ),
            None => Arc::new(LogAlertPublisher),
        };

        let collaborators = Collaborators {
            provider: Arc::new(provider),
            weather: Arc::new(weather),
            store,
            invoker: Arc::new(invoker),
            alerts,
        };

        Ok(Self::new(collaborators, DetectorSettings::from_config(config)))
    }

    /// The configured threshold/floor policy
    pub fn decider(&self) -> AnomalyDecider {
        self.decider
    }

    /// Run the full pipeline for one site
    ///
    /// An empty `parameter_code` means [`DEFAULT_PARAMETER_CODE`].
    pub async fn process_infer_and_detect(
        &self,
        site_id: &str,
        parameter_code: &str,
    ) -> Result<PredictionResult, DetectError> {
        self.run_site(site_id, parameter_code, &self.decider).await
    }

    async fn run_site(
        &self,
        site_id: &str,
        parameter_code: &str,
        decider: &AnomalyDecider,
    ) -> Result<PredictionResult, DetectError> {
        let site_id = site_id.trim();
        if site_id.is_empty() {
            return Err(DetectError::Configuration("site id is required".to_string()));
        }
        self.inference.ensure_configured()?;
        let parameter_code = effective_parameter(parameter_code);

        let batch = self
            .source
            .fetch_batch_with(&[site_id.to_string()], parameter_code, &LATEST_LADDER)
            .await?;
        let document = batch
            .documents
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| {
                DetectError::ProviderFetch(format!("no document returned for site {}", site_id))
            })?;

        let encoded = self.encoder.encode(&document).await?;
        let latest = encoded.latest.as_ref().ok_or_else(|| {
            DetectError::Parse(format!("no usable observation for site {}", site_id))
        })?;
        let csv = encoded.to_csv();

        let dataset_key = snapshot_key(site_id, Utc::now());
        if !self.persist_snapshots {
            debug!(site_id, key = %dataset_key, "Snapshot persistence disabled");
        } else if let Err(e) = self.accumulator.accumulate(csv.as_bytes(), &dataset_key).await {
            warn!(site_id, key = %dataset_key, error = %e, "Snapshot persistence failed, continuing");
        }

        let predicted = self.inference.predict(csv.as_bytes()).await?;
        let decision = decider.decide(latest.value, predicted);

        info!(
            site_id,
            observed = decision.observed_value,
            predicted = decision.predicted_value,
            percent_change = decision.percent_change,
            anomalous = decision.anomalous,
            origin = %batch.origin,
            "Site evaluated"
        );

        Ok(PredictionResult {
            dataset_key,
            observed_value: decision.observed_value,
            predicted_value: decision.predicted_value,
            percent_change: decision.percent_change,
            anomalous: decision.anomalous,
            data_origin: batch.origin,
        })
    }

    /// Encode documents and append the rows to the dataset at `dataset_key`
    ///
    /// Returns the whole dataset after the append. Absent documents are skipped.
    pub async fn encode_and_accumulate(
        &self,
        documents: &[Option<RawDocument>],
        dataset_key: &str,
    ) -> Result<Vec<u8>, DetectError> {
        let (merged, _rows) = self.accumulate_documents(documents, dataset_key).await?;
        Ok(merged)
    }

    async fn accumulate_documents(
        &self,
        documents: &[Option<RawDocument>],
        dataset_key: &str,
    ) -> Result<(Vec<u8>, usize), DetectError> {
        let dataset_key = dataset_key.trim();
        if dataset_key.is_empty() {
            return Err(DetectError::Configuration(
                "dataset key is required".to_string(),
            ));
        }

        let batch = self.encoder.encode_batch(documents).await?;
        let merged = self
            .accumulator
            .accumulate(batch.csv.as_bytes(), dataset_key)
            .await?;
        Ok((merged, batch.rows))
    }

    /// Fetch stations with the full fallback ladder and append their rows
    /// to `processed_key`
    pub async fn preprocess_sites(
        &self,
        stations: &[String],
        parameter_code: &str,
        processed_key: &str,
    ) -> Result<PreprocessOutcome, DetectError> {
        if stations.iter().all(|s| s.trim().is_empty()) {
            return Err(DetectError::Configuration(
                "at least one station is required".to_string(),
            ));
        }
        let parameter_code = parameter_code.trim();
        if parameter_code.is_empty() {
            return Err(DetectError::Configuration(
                "parameter code is required".to_string(),
            ));
        }
        if processed_key.trim().is_empty() {
            return Err(DetectError::Configuration(
                "processed key is required".to_string(),
            ));
        }

        let batch = self.source.fetch_batch(stations, parameter_code).await?;
        let (merged, rows) = self
            .accumulate_documents(&batch.documents, processed_key)
            .await?;

        info!(
            stations = stations.len(),
            rows,
            bytes = merged.len(),
            key = processed_key.trim(),
            origin = %batch.origin,
            "Preprocess complete"
        );

        Ok(PreprocessOutcome {
            processed_key: processed_key.trim().to_string(),
            bytes: merged.len(),
            rows,
            data_origin: batch.origin,
        })
    }

    /// Predict from a stored dataset
    ///
    /// A non-blank `target_model` replaces the configured model for this call.
    pub async fn infer_dataset(
        &self,
        processed_key: &str,
        target_model: Option<&str>,
    ) -> Result<f64, DetectError> {
        let processed_key = processed_key.trim();
        if processed_key.is_empty() {
            return Err(DetectError::Configuration(
                "processed key is required".to_string(),
            ));
        }
        let (_, model) = self.inference.resolve(target_model)?;

        let dataset = self.accumulator.load(processed_key).await?;
        let predicted = self
            .inference
            .predict_with_model(&dataset, Some(model))
            .await?;

        info!(key = processed_key, model, predicted, "Dataset inference complete");
        Ok(predicted)
    }

    /// Evaluate several sites, reporting successes and failures separately
    ///
    /// Blank ids are skipped but count toward [`MAX_BATCH_SITES`]. A positive `threshold_override` replaces the
    /// configured threshold for this call only. One alert is published when
    /// any site is anomalous.
    pub async fn detect_sites(
        &self,
        sites: &[String],
        parameter_code: &str,
        threshold_override: Option<f64>,
    ) -> Result<BatchDetection, DetectError> {
        if sites.len() > MAX_BATCH_SITES {
            return Err(DetectError::Configuration(format!(
                "at most {} sites per request, got {}",
                MAX_BATCH_SITES,
                sites.len()
            )));
        }

        let sites: Vec<String> = sites
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();

        if sites.is_empty() {
            return Err(DetectError::Configuration(
                "at least one site is required".to_string(),
            ));
        }

        self.inference.ensure_configured()?;

        let decider = match threshold_override {
            Some(threshold) if threshold > 0.0 && threshold.is_finite() => {
                self.decider.with_threshold(threshold)
            }
            _ => self.decider,
        };

        let outcomes: Vec<(String, Result<PredictionResult, DetectError>)> = stream::iter(sites)
            .map(|site| {
                let decider = &decider;
                async move {
                    let outcome = self.run_site(&site, parameter_code, decider).await;
                    (site, outcome)
                }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut report = BatchDetection::default();
        for (site, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    let anomalous_reason = if result.anomalous {
                        ANOMALY_REASON.to_string()
                    } else {
                        String::new()
                    };
                    report.items.push(SiteDetection {
                        site,
                        result,
                        anomalous_reason,
                    });
                }
                Err(e) => {
                    warn!(site = %site, error = %e, "Site check failed");
                    report.failures.push(SiteFailure {
                        site,
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Some((subject, message)) = compose_alert(&report) {
            match self.alerts.publish(&subject, &message).await {
                Ok(()) => info!(%subject, "Anomaly alert published"),
                Err(e) => warn!(error = %e, "Anomaly alert publication failed"),
            }
        }

        Ok(report)
    }
}

/// Subject and body for a batch with anomalies, `None` when there are none
pub fn compose_alert(report: &BatchDetection) -> Option<(String, String)> {
    let lines: Vec<String> = report
        .anomalous()
        .map(|item| {
            format!(
                "Site {} anomalous: observed={:.2} predicted={:.2} ({:.1}%)",
                item.site,
                item.result.observed_value,
                item.result.predicted_value,
                item.result.percent_change
            )
        })
        .collect();

    if lines.is_empty() {
        return None;
    }

    let subject = format!("AquaWatch Anomalies Detected ({})", lines.len());
    Some((subject, lines.join("\n")))
}

/// Storage key for a single-site snapshot
pub fn snapshot_key(site_id: &str, at: DateTime<Utc>) -> String {
    format!("processed/{}/{}.csv", site_id, at.timestamp())
}

fn effective_parameter(parameter_code: &str) -> &str {
    match parameter_code.trim() {
        "" => DEFAULT_PARAMETER_CODE,
        code => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataOrigin, SiteDetection};
    use chrono::TimeZone;

    fn item(site: &str, observed: f64, predicted: f64, pct: f64, anomalous: bool) -> SiteDetection {
        SiteDetection {
            site: site.to_string(),
            result: PredictionResult {
                dataset_key: format!("processed/{}/1.csv", site),
                observed_value: observed,
                predicted_value: predicted,
                percent_change: pct,
                anomalous,
                data_origin: DataOrigin::Instantaneous,
            },
            anomalous_reason: String::new(),
        }
    }

    #[test]
    fn test_compose_alert_lists_anomalous_sites_only() {
        let report = BatchDetection {
            items: vec![
                item("A", 5.0, 20.0, 300.0, true),
                item("B", 72.3, 66.2, 8.437, false),
                item("C", 10.0, 31.456, 214.56, true),
            ],
            failures: vec![],
        };

        let (subject, message) = compose_alert(&report).unwrap();

        assert_eq!(subject, "AquaWatch Anomalies Detected (2)");
        assert_eq!(
            message,
            "Site A anomalous: observed=5.00 predicted=20.00 (300.0%)\n\
             Site C anomalous: observed=10.00 predicted=31.46 (214.6%)"
        );
    }

    #[test]
    fn test_compose_alert_none_without_anomalies() {
        let report = BatchDetection {
            items: vec![item("B", 72.3, 66.2, 8.437, false)],
            failures: vec![],
        };
        assert!(compose_alert(&report).is_none());
    }

    #[test]
    fn test_snapshot_key() {
        let at = Utc.with_ymd_and_hms(2025, 8, 24, 16, 15, 0).unwrap();
        assert_eq!(
            snapshot_key("03339000", at),
            "processed/03339000/1756052100.csv"
        );
    }

    #[test]
    fn test_snapshots_follow_data_folder() {
        let mut config = TomlConfig::default();
        assert!(!DetectorSettings::from_config(&config).persist_snapshots);

        config.storage.data_folder = Some(std::path::PathBuf::from("/var/lib/aquawatch"));
        assert!(DetectorSettings::from_config(&config).persist_snapshots);
    }

    #[test]
    fn test_effective_parameter_defaults_to_discharge() {
        assert_eq!(effective_parameter(""), "00060");
        assert_eq!(effective_parameter("  "), "00060");
        assert_eq!(effective_parameter(" 00065 "), "00065");
    }
}
