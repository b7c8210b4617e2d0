//! HTTP prediction endpoint invoker
//!
//! Posts feature CSV to `{base}/endpoints/{endpoint}/invocations`. Multi-model
//! endpoints pick the model from the `X-Target-Model` header.

use std::time::Duration;

use aquawatch_common::config::InferenceConfig;

use crate::types::{InvokeError, ModelInvoker};

pub const TARGET_MODEL_HEADER: &str = "X-Target-Model";

pub struct HttpModelInvoker {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpModelInvoker {
    pub fn new(config: &InferenceConfig) -> Result<Self, InvokeError> {
        Self::with_base_url(&config.base_url, config.timeout())
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, InvokeError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InvokeError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn invocation_url(&self, endpoint: &str) -> String {
        format!("{}/endpoints/{}/invocations", self.base_url, endpoint)
    }
}

#[async_trait::async_trait]
impl ModelInvoker for HttpModelInvoker {
    async fn invoke(
        &self,
        endpoint: &str,
        payload: &[u8],
        target_model: &str,
    ) -> Result<Vec<u8>, InvokeError> {
        let url = self.invocation_url(endpoint);

        let mut request = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(payload.to_vec());
        if !target_model.is_empty() {
            request = request.header(TARGET_MODEL_HEADER, target_model);
        }

        tracing::debug!(url = %url, target_model, bytes = payload.len(), "Invoking model endpoint");

        let response = request
            .send()
            .await
            .map_err(|e| InvokeError::NetworkError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(InvokeError::ApiError(status.as_u16(), error_text));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| InvokeError::NetworkError(e.to_string()))?;

        Ok(body.to_vec())
    }
}
