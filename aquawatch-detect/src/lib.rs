//! aquawatch-detect library interface
//!
//! Exposes the pipeline, collaborator clients and router for the binary and
//! for integration tests.

pub mod api;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult, DetectError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::pipeline::Detector;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<Detector>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(detector: Arc<Detector>) -> Self {
        Self {
            detector,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::anomaly_routes())
        .merge(api::preprocess_routes())
        .merge(api::infer_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
