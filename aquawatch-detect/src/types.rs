//! Core Types and Collaborator Trait Definitions
//!
//! The detection pipeline talks to five external services. Each one sits
//! behind a trait here so the pipeline can run against the HTTP clients in
//! [`crate::services`] or against in-process fakes:
//!
//! - [`TimeSeriesProvider`] - raw time-series documents per site
//! - [`WeatherLookup`] - point weather reading for a coordinate
//! - [`BlobStore`] - dataset persistence by key
//! - [`ModelInvoker`] - external prediction endpoint
//! - [`AlertPublisher`] - alert notification
//!
//! All implementations must be safe to call concurrently; none of them hold
//! mutable state shared between site pipelines.

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Common Types
// ============================================================================

/// Raw provider payload for one site, kept opaque until the encoder parses it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument(Vec<u8>);

impl RawDocument {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<u8>> for RawDocument {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Time-series granularity requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Rolling 30-day window of daily means ending today (UTC)
    Daily30d,
    /// Latest instantaneous value
    Instantaneous,
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Daily30d => write!(f, "daily30d"),
            Granularity::Instantaneous => write!(f, "instantaneous"),
        }
    }
}

/// First forecast period for a coordinate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherReading {
    pub temperature: i64,
    pub unit: String,
    pub wind_speed: String,
    pub wind_direction: String,
}

// ============================================================================
// Collaborator Errors
// ============================================================================

/// Time-series provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),
}

/// Weather lookup errors
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Forecast URL missing in points response")]
    MissingForecastUrl,

    #[error("No forecast periods available")]
    NoPeriods,
}

/// Blob store errors
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Model invocation errors
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Endpoint returned {0}: {1}")]
    ApiError(u16, String),
}

/// Alert publication errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Alert sink returned {0}")]
    ApiError(u16),
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Fetches one raw time-series document for one site
#[async_trait::async_trait]
pub trait TimeSeriesProvider: Send + Sync {
    async fn fetch_series(
        &self,
        site_id: &str,
        parameter_code: &str,
        granularity: Granularity,
    ) -> Result<RawDocument, ProviderError>;
}

/// Looks up the current weather at a coordinate
#[async_trait::async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn fetch_weather(&self, latitude: f64, longitude: f64)
        -> Result<WeatherReading, WeatherError>;
}

/// Byte storage addressed by caller-supplied key, last write wins
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Vec<u8>, BlobError>;

    async fn save(&self, data: &[u8], key: &str) -> Result<(), BlobError>;
}

/// Synchronous request/response call to a prediction endpoint
#[async_trait::async_trait]
pub trait ModelInvoker: Send + Sync {
    /// `target_model` selects the model variant on multi-model endpoints
    async fn invoke(
        &self,
        endpoint: &str,
        payload: &[u8],
        target_model: &str,
    ) -> Result<Vec<u8>, InvokeError>;
}

/// Sends a human-readable alert
#[async_trait::async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), AlertError>;
}
