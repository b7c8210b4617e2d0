//! National Weather Service client
//!
//! Two requests per lookup: `/points/{lat},{lon}` names the forecast URL for
//! the grid cell, and the forecast's first period is the reading.

use std::time::Duration;

use aquawatch_common::config::WeatherConfig;
use serde::Deserialize;

use crate::types::{WeatherError, WeatherLookup, WeatherReading};

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    #[serde(default)]
    forecast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    #[serde(default)]
    periods: Vec<ForecastPeriod>,
}

#[derive(Debug, Deserialize)]
struct ForecastPeriod {
    temperature: i64,
    #[serde(default, rename = "temperatureUnit")]
    temperature_unit: String,
    #[serde(default, rename = "windSpeed")]
    wind_speed: String,
    #[serde(default, rename = "windDirection")]
    wind_direction: String,
}

/// NWS weather client
pub struct NwsWeatherClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl NwsWeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::with_base_url(&config.base_url, &config.user_agent, config.timeout())
    }

    pub fn with_base_url(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn points_url(&self, latitude: f64, longitude: f64) -> String {
        format!("{}/points/{:.4},{:.4}", self.base_url, latitude, longitude)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, WeatherError> {
        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/geo+json")
            .send()
            .await
            .map_err(|e| WeatherError::NetworkError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WeatherError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| WeatherError::ParseError(e.to_string()))
    }
}

#[async_trait::async_trait]
impl WeatherLookup for NwsWeatherClient {
    async fn fetch_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherReading, WeatherError> {
        let points_url = self.points_url(latitude, longitude);
        tracing::debug!(url = %points_url, "Querying NWS points");

        let points: PointsResponse = self.get_json(&points_url).await?;
        let forecast_url = points
            .properties
            .forecast
            .filter(|url| !url.is_empty())
            .ok_or(WeatherError::MissingForecastUrl)?;

        tracing::debug!(url = %forecast_url, "Querying NWS forecast");

        let forecast: ForecastResponse = self.get_json(&forecast_url).await?;
        let period = forecast
            .properties
            .periods
            .into_iter()
            .next()
            .ok_or(WeatherError::NoPeriods)?;

        tracing::debug!(
            latitude,
            longitude,
            temperature = period.temperature,
            unit = %period.temperature_unit,
            "Weather reading retrieved"
        );

        Ok(WeatherReading {
            temperature: period.temperature,
            unit: period.temperature_unit,
            wind_speed: period.wind_speed,
            wind_direction: period.wind_direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(NwsWeatherClient::new(&WeatherConfig::default()).is_ok());
    }

    #[test]
    fn test_points_url_uses_four_decimals() {
        let client =
            NwsWeatherClient::with_base_url("https://api.weather.example/", "test", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            client.points_url(40.1010833, -87.5976111),
            "https://api.weather.example/points/40.1011,-87.5976"
        );
    }

    #[test]
    fn test_forecast_period_parses() {
        let forecast: ForecastResponse = serde_json::from_str(
            r#"{"properties":{"periods":[
                {"number":1,"temperature":81,"temperatureUnit":"F","windSpeed":"5 to 10 mph","windDirection":"SW"},
                {"number":2,"temperature":64,"temperatureUnit":"F","windSpeed":"5 mph","windDirection":"S"}
            ]}}"#,
        )
        .unwrap();

        let first = &forecast.properties.periods[0];
        assert_eq!(first.temperature, 81);
        assert_eq!(first.wind_speed, "5 to 10 mph");
    }

    #[test]
    fn test_points_without_forecast() {
        let points: PointsResponse =
            serde_json::from_str(r#"{"properties":{"gridId":"ILX"}}"#).unwrap();
        assert!(points.properties.forecast.is_none());
    }
}
