//! Dataset preprocessing endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::models::PreprocessOutcome;
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct PreprocessRequest {
    #[serde(default)]
    pub stations: Vec<String>,
    #[serde(default)]
    pub parameter: String,
    #[serde(default)]
    pub processed_key: String,
}

/// POST /preprocess
///
/// Fetches the stations, encodes their rows and appends them to the dataset
/// at `processed_key`. Missing stations, parameter or key is a 400.
pub async fn preprocess(
    State(state): State<AppState>,
    Json(request): Json<PreprocessRequest>,
) -> ApiResult<Json<PreprocessOutcome>> {
    let outcome = state
        .detector
        .preprocess_sites(&request.stations, &request.parameter, &request.processed_key)
        .await?;
    Ok(Json(outcome))
}

pub fn preprocess_routes() -> Router<AppState> {
    Router::new().route("/preprocess", post(preprocess))
}
