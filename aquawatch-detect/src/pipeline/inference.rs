//! Prediction endpoint client and response parsing

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::DetectError;
use crate::types::ModelInvoker;

/// Drop the first (label) column from every non-blank row
///
/// Single-column rows are kept as they are. Output rows are newline-terminated.
pub fn strip_label_column(csv: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(csv);
    let mut out = String::with_capacity(text.len());

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(',') {
            Some((_, features)) => out.push_str(features),
            None => out.push_str(line),
        }
        out.push('\n');
    }

    out.into_bytes()
}

/// Extract the prediction from raw endpoint output
///
/// Accepts bracketed lists, newline, comma, tab or space separated values.
/// Non-numeric tokens are skipped and the **last** numeric token wins: models
/// may emit per-row output before the final consensus value.
pub fn parse_predictions(output: &[u8]) -> Result<f64, DetectError> {
    let text = String::from_utf8_lossy(output);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DetectError::NoPredictionParsed(
            "empty prediction output".to_string(),
        ));
    }

    let normalized: String = trimmed
        .chars()
        .map(|c| match c {
            '[' | ']' | '\n' | '\r' | '\t' | ' ' => ',',
            other => other,
        })
        .collect();

    normalized
        .split(',')
        .filter_map(|token| token.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .last()
        .ok_or_else(|| {
            DetectError::NoPredictionParsed(format!(
                "no numeric token in output: {}",
                truncate(trimmed, 120)
            ))
        })
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Invokes the configured prediction endpoint
pub struct InferenceClient {
    invoker: Arc<dyn ModelInvoker>,
    endpoint: Option<String>,
    target_model: Option<String>,
}

impl InferenceClient {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        endpoint: Option<String>,
        target_model: Option<String>,
    ) -> Self {
        Self {
            invoker,
            endpoint: endpoint.filter(|s| !s.trim().is_empty()),
            target_model: target_model.filter(|s| !s.trim().is_empty()),
        }
    }

    /// Endpoint and target model, or a configuration error naming what is missing
    pub fn ensure_configured(&self) -> Result<(&str, &str), DetectError> {
        self.resolve(None)
    }

    /// Like [`Self::ensure_configured`], with a non-blank `model_override`
    /// taking the place of the configured target model
    pub fn resolve<'a>(
        &'a self,
        model_override: Option<&'a str>,
    ) -> Result<(&'a str, &'a str), DetectError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            DetectError::Configuration("inference endpoint is not configured".to_string())
        })?;
        let target_model = model_override
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .or(self.target_model.as_deref())
            .ok_or_else(|| {
                DetectError::Configuration("target model is not configured".to_string())
            })?;
        Ok((endpoint, target_model))
    }

    /// Send feature-only CSV and return the raw response
    pub async fn invoke(&self, features_csv: &[u8]) -> Result<Vec<u8>, DetectError> {
        self.invoke_with_model(features_csv, None).await
    }

    pub async fn invoke_with_model(
        &self,
        features_csv: &[u8],
        model_override: Option<&str>,
    ) -> Result<Vec<u8>, DetectError> {
        let (endpoint, target_model) = self.resolve(model_override)?;

        debug!(endpoint, target_model, bytes = features_csv.len(), "Invoking prediction endpoint");

        let output = self
            .invoker
            .invoke(endpoint, features_csv, target_model)
            .await
            .map_err(|e| {
                warn!(endpoint, error = %e, "Prediction endpoint call failed");
                DetectError::Endpoint(format!("{}: {}", endpoint, e))
            })?;

        info!(endpoint, bytes = output.len(), "Prediction endpoint responded");
        Ok(output)
    }

    /// Strip labels, invoke, and parse the prediction
    pub async fn predict(&self, labelled_csv: &[u8]) -> Result<f64, DetectError> {
        self.predict_with_model(labelled_csv, None).await
    }

    pub async fn predict_with_model(
        &self,
        labelled_csv: &[u8],
        model_override: Option<&str>,
    ) -> Result<f64, DetectError> {
        let features = strip_label_column(labelled_csv);
        let output = self.invoke_with_model(&features, model_override).await?;
        parse_predictions(&output)
    }
}
