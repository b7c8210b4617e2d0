//! HTTP API handlers for aquawatch-detect
//!
//! Thin adapters over [`crate::pipeline::Detector`]; errors render through
//! [`crate::ApiError`].

pub mod anomaly;
pub mod health;
pub mod infer;
pub mod preprocess;

pub use anomaly::anomaly_routes;
pub use health::health_routes;
pub use infer::infer_routes;
pub use preprocess::preprocess_routes;
