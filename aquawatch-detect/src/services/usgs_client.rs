//! USGS water services client
//!
//! Fetches WaterML JSON for one site per request from the instantaneous
//! (`/nwis/iv`) or daily (`/nwis/dv`) service. The body is returned as-is;
//! parsing belongs to the encoder.

use std::time::Duration;

use aquawatch_common::config::UsgsConfig;
use aquawatch_common::time;

use crate::types::{Granularity, ProviderError, RawDocument, TimeSeriesProvider};

const USER_AGENT: &str = concat!("aquawatch/", env!("CARGO_PKG_VERSION"));

/// Daily statistic requested from the daily service (mean)
pub const DAILY_MEAN_STAT: &str = "00003";

/// Length of the daily window, ending today (UTC)
pub const DAILY_WINDOW_DAYS: i64 = 30;

/// USGS time-series client
pub struct UsgsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl UsgsClient {
    pub fn new(config: &UsgsConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(&config.base_url, config.timeout())
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Request URL for one site
    pub fn series_url(&self, site_id: &str, parameter_code: &str, granularity: Granularity) -> String {
        match granularity {
            Granularity::Instantaneous => format!(
                "{}/nwis/iv/?format=json&sites={}&parameterCd={}",
                self.base_url, site_id, parameter_code
            ),
            Granularity::Daily30d => {
                let (start, end) = time::day_window(time::now(), DAILY_WINDOW_DAYS);
                format!(
                    "{}/nwis/dv/?format=json&sites={}&parameterCd={}&statCd={}&startDT={}&endDT={}",
                    self.base_url, site_id, parameter_code, DAILY_MEAN_STAT, start, end
                )
            }
        }
    }
}

#[async_trait::async_trait]
impl TimeSeriesProvider for UsgsClient {
    async fn fetch_series(
        &self,
        site_id: &str,
        parameter_code: &str,
        granularity: Granularity,
    ) -> Result<RawDocument, ProviderError> {
        let url = self.series_url(site_id, parameter_code, granularity);

        tracing::debug!(site_id, %granularity, url = %url, "Querying USGS water services");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(status.as_u16(), error_text));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        tracing::debug!(site_id, bytes = body.len(), "USGS response received");

        Ok(RawDocument::new(body.to_vec()))
    }
}
