//! Error types for aquawatch-detect
//!
//! [`DetectError`] is the pipeline's failure taxonomy; [`ApiError`] is its
//! HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Hard failures of a pipeline run
///
/// Soft failures (weather lookup, snapshot persistence, alert publication)
/// never surface here; they are logged and the run continues.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Missing site, endpoint, model or key. Not retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider failure after the fallback ladder gave up
    #[error("Provider fetch error: {0}")]
    ProviderFetch(String),

    /// Provider document could not be decoded at all
    #[error("Parse error: {0}")]
    Parse(String),

    /// Prediction endpoint unreachable or returned a non-success status
    #[error("Endpoint error: {0}")]
    Endpoint(String),

    /// Endpoint output held no numeric token
    #[error("No prediction parsed: {0}")]
    NoPredictionParsed(String),

    /// Dataset load or save failed where persistence is mandatory
    #[error("Storage error: {0}")]
    Storage(String),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Pipeline failure
    #[error(transparent)]
    Detect(#[from] DetectError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Detect(err) => match err {
                DetectError::Configuration(_) => (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR"),
                DetectError::ProviderFetch(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
                DetectError::Parse(_) => (StatusCode::BAD_GATEWAY, "PARSE_ERROR"),
                DetectError::Endpoint(_) => (StatusCode::BAD_GATEWAY, "ENDPOINT_ERROR"),
                DetectError::NoPredictionParsed(_) => {
                    (StatusCode::BAD_GATEWAY, "NO_PREDICTION_PARSED")
                }
                DetectError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
