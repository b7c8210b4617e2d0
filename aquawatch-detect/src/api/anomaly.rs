//! Batch anomaly check endpoint
//!
//! POST /anomaly/check
//!
//! **Request:** `{"sites": ["03339000"], "threshold_percent": 25.0, "parameter": "00060"}`
//! (`threshold_percent` and `parameter` optional)
//!
//! **Response:** `{"items": [...], "failures": [{"site", "error"}]}`. One
//! failing site never fails the request; it is listed under `failures`.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::models::BatchDetection;
use crate::pipeline::MAX_BATCH_SITES;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct AnomalyCheckRequest {
    #[serde(default)]
    pub sites: Vec<String>,
    /// Overrides the configured threshold when positive
    #[serde(default)]
    pub threshold_percent: Option<f64>,
    #[serde(default)]
    pub parameter: Option<String>,
}

/// POST /anomaly/check
///
/// **Errors:**
/// - 400 Bad Request: no non-blank sites, or more than 10 entries
/// - 400 Bad Request: inference endpoint or model not configured
pub async fn check_anomalies(
    State(state): State<AppState>,
    Json(request): Json<AnomalyCheckRequest>,
) -> ApiResult<Json<BatchDetection>> {
    // Blank entries still count toward the cap
    if request.sites.len() > MAX_BATCH_SITES {
        return Err(ApiError::BadRequest(format!(
            "at most {} sites per request, got {}",
            MAX_BATCH_SITES,
            request.sites.len()
        )));
    }
    let site_count = request.sites.iter().filter(|s| !s.trim().is_empty()).count();
    if site_count == 0 {
        return Err(ApiError::BadRequest("sites must not be empty".to_string()));
    }

    info!(sites = site_count, "Anomaly check requested");

    let report = state
        .detector
        .detect_sites(
            &request.sites,
            request.parameter.as_deref().unwrap_or_default(),
            request.threshold_percent,
        )
        .await?;

    Ok(Json(report))
}

pub fn anomaly_routes() -> Router<AppState> {
    Router::new().route("/anomaly/check", post(check_anomalies))
}
