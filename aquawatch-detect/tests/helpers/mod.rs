//! Test Helper Utilities
//!
//! In-process fakes for every collaborator plus a document builder.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use aquawatch_common::config::AnomalyConfig;
use aquawatch_detect::pipeline::{Collaborators, Detector, DetectorSettings};
use aquawatch_detect::services::MemoryBlobStore;
use aquawatch_detect::types::{
    AlertError, AlertPublisher, BlobError, BlobStore, Granularity, InvokeError, ModelInvoker,
    ProviderError, RawDocument, TimeSeriesProvider, WeatherError, WeatherLookup, WeatherReading,
};

/// WaterML-shaped JSON for one site with the given `(value, dateTime)` points
pub fn water_document(site: &str, latitude: f64, longitude: f64, points: &[(&str, &str)]) -> String {
    let points: Vec<serde_json::Value> = points
        .iter()
        .map(|(value, ts)| serde_json::json!({"value": value, "qualifiers": ["P"], "dateTime": ts}))
        .collect();

    serde_json::json!({
        "value": {
            "timeSeries": [{
                "sourceInfo": {
                    "siteName": format!("Gauge {}", site),
                    "siteCode": [{"value": site, "network": "NWIS"}],
                    "geoLocation": {"geogLocation": {"latitude": latitude, "longitude": longitude}}
                },
                "variable": {"unit": {"unitCode": "ft3/s"}},
                "values": [{"value": points}],
                "name": format!("USGS:{}:00060:00000", site)
            }]
        }
    })
    .to_string()
}

// ============================================================================
// Time-series provider
// ============================================================================

/// Serves one document per site; unknown sites and failing granularities error
#[derive(Default)]
pub struct FakeProvider {
    documents: HashMap<String, String>,
    failing: HashSet<Granularity>,
    pub calls: Mutex<Vec<(String, String, Granularity)>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, site: &str, document: String) -> Self {
        self.documents.insert(site.to_string(), document);
        self
    }

    pub fn failing(mut self, granularity: Granularity) -> Self {
        self.failing.insert(granularity);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl TimeSeriesProvider for FakeProvider {
    async fn fetch_series(
        &self,
        site_id: &str,
        parameter_code: &str,
        granularity: Granularity,
    ) -> Result<RawDocument, ProviderError> {
        self.calls.lock().unwrap().push((
            site_id.to_string(),
            parameter_code.to_string(),
            granularity,
        ));

        if self.failing.contains(&granularity) {
            return Err(ProviderError::NetworkError("connection reset".to_string()));
        }
        self.documents
            .get(site_id)
            .map(|doc| RawDocument::new(doc.clone().into_bytes()))
            .ok_or_else(|| ProviderError::ApiError(404, format!("unknown site {}", site_id)))
    }
}

// ============================================================================
// Weather
// ============================================================================

pub struct FakeWeather {
    temperature: Option<i64>,
}

impl FakeWeather {
    pub fn fixed(temperature: i64) -> Self {
        Self {
            temperature: Some(temperature),
        }
    }

    pub fn unavailable() -> Self {
        Self { temperature: None }
    }
}

#[async_trait::async_trait]
impl WeatherLookup for FakeWeather {
    async fn fetch_weather(&self, _lat: f64, _lon: f64) -> Result<WeatherReading, WeatherError> {
        match self.temperature {
            Some(temperature) => Ok(WeatherReading {
                temperature,
                unit: "F".to_string(),
                wind_speed: "10 mph".to_string(),
                wind_direction: "NW".to_string(),
            }),
            None => Err(WeatherError::ApiError(500, "upstream".to_string())),
        }
    }
}

// ============================================================================
// Model invoker
// ============================================================================

/// Answers by payload content: the first rule whose marker appears in the
/// payload decides the output; otherwise the default output is returned
pub struct FakeInvoker {
    default_output: Result<String, u16>,
    rules: Vec<(String, Result<String, u16>)>,
    pub calls: Mutex<Vec<(String, String, String)>>,
}

impl FakeInvoker {
    pub fn responding(output: &str) -> Self {
        Self {
            default_output: Ok(output.to_string()),
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            default_output: Err(status),
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn when_payload_contains(mut self, marker: &str, output: &str) -> Self {
        self.rules.push((marker.to_string(), Ok(output.to_string())));
        self
    }

    pub fn fail_when_payload_contains(mut self, marker: &str, status: u16) -> Self {
        self.rules.push((marker.to_string(), Err(status)));
        self
    }

    pub fn payloads(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload, _)| payload.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ModelInvoker for FakeInvoker {
    async fn invoke(
        &self,
        endpoint: &str,
        payload: &[u8],
        target_model: &str,
    ) -> Result<Vec<u8>, InvokeError> {
        let payload = String::from_utf8_lossy(payload).to_string();
        self.calls.lock().unwrap().push((
            endpoint.to_string(),
            payload.clone(),
            target_model.to_string(),
        ));

        let output = self
            .rules
            .iter()
            .find(|(marker, _)| payload.contains(marker.as_str()))
            .map(|(_, output)| output)
            .unwrap_or(&self.default_output);

        match output {
            Ok(text) => Ok(text.clone().into_bytes()),
            Err(status) => Err(InvokeError::ApiError(*status, "model error".to_string())),
        }
    }
}

// ============================================================================
// Blob store and alerts
// ============================================================================

/// Loads nothing and refuses every save
pub struct ReadOnlyStore;

#[async_trait::async_trait]
impl BlobStore for ReadOnlyStore {
    async fn load(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        Err(BlobError::NotFound(key.to_string()))
    }

    async fn save(&self, _data: &[u8], _key: &str) -> Result<(), BlobError> {
        Err(BlobError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    pub published: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl AlertPublisher for RecordingAlerts {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), AlertError> {
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}

// ============================================================================
// Detector assembly
// ============================================================================

/// Fakes wired into a detector, kept for assertions
pub struct Harness {
    pub provider: Arc<FakeProvider>,
    pub store: Arc<MemoryBlobStore>,
    pub invoker: Arc<FakeInvoker>,
    pub alerts: Arc<RecordingAlerts>,
    pub detector: Detector,
}

pub fn settings() -> DetectorSettings {
    DetectorSettings {
        endpoint: Some("discharge-endpoint".to_string()),
        target_model: Some("discharge-model.tar.gz".to_string()),
        anomaly: AnomalyConfig::default(),
        max_concurrency: 4,
        persist_snapshots: true,
    }
}

pub fn harness(provider: FakeProvider, invoker: FakeInvoker) -> Harness {
    harness_with(provider, invoker, settings())
}

pub fn harness_with(
    provider: FakeProvider,
    invoker: FakeInvoker,
    settings: DetectorSettings,
) -> Harness {
    let provider = Arc::new(provider);
    let store = Arc::new(MemoryBlobStore::new());
    let invoker = Arc::new(invoker);
    let alerts = Arc::new(RecordingAlerts::default());

    let detector = Detector::new(
        Collaborators {
            provider: provider.clone(),
            weather: Arc::new(FakeWeather::fixed(81)),
            store: store.clone(),
            invoker: invoker.clone(),
            alerts: alerts.clone(),
        },
        settings,
    );

    Harness {
        provider,
        store,
        invoker,
        alerts,
        detector,
    }
}
