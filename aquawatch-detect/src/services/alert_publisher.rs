//! Alert publishers

use std::time::Duration;

use serde::Serialize;

use crate::types::{AlertError, AlertPublisher};

/// Writes alerts to the log only
pub struct LogAlertPublisher;

#[async_trait::async_trait]
impl AlertPublisher for LogAlertPublisher {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), AlertError> {
        tracing::warn!(subject, message, "Anomaly alert");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    subject: &'a str,
    message: &'a str,
}

/// Posts `{"subject", "message"}` JSON to a webhook
pub struct WebhookAlertPublisher {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookAlertPublisher {
    pub fn new(url: String, timeout: Duration) -> Result<Self, AlertError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlertError::NetworkError(e.to_string()))?;

        Ok(Self { http_client, url })
    }
}

#[async_trait::async_trait]
impl AlertPublisher for WebhookAlertPublisher {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), AlertError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&AlertPayload { subject, message })
            .send()
            .await
            .map_err(|e| AlertError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::ApiError(status.as_u16()));
        }

        tracing::debug!(url = %self.url, subject, "Alert delivered to webhook");
        Ok(())
    }
}
