//! Collaborator implementations
//!
//! HTTP clients and stores behind the traits in [`crate::types`].

pub mod alert_publisher;
pub mod blob_store;
pub mod model_invoker;
pub mod usgs_client;
pub mod weather_client;

pub use alert_publisher::{LogAlertPublisher, WebhookAlertPublisher};
pub use blob_store::{FsBlobStore, MemoryBlobStore};
pub use model_invoker::HttpModelInvoker;
pub use usgs_client::UsgsClient;
pub use weather_client::NwsWeatherClient;
