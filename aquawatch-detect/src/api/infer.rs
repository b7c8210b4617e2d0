//! Stored-dataset inference endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct InferRequest {
    #[serde(default)]
    pub processed_key: String,
    /// Model to serve this request; the configured model when absent
    #[serde(default)]
    pub target_model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InferResponse {
    pub processed_key: String,
    pub predicted_value: f64,
}

/// POST /infer
pub async fn infer(
    State(state): State<AppState>,
    Json(request): Json<InferRequest>,
) -> ApiResult<Json<InferResponse>> {
    let predicted_value = state
        .detector
        .infer_dataset(&request.processed_key, request.target_model.as_deref())
        .await?;
    Ok(Json(InferResponse {
        processed_key: request.processed_key.trim().to_string(),
        predicted_value,
    }))
}

pub fn infer_routes() -> Router<AppState> {
    Router::new().route("/infer", post(infer))
}
