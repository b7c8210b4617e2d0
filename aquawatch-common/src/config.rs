//! Configuration loading for AquaWatch services
//!
//! Two sources are layered over compiled defaults:
//! 1. Environment variables (highest priority)
//! 2. TOML bootstrap file
//! 3. Built-in defaults (code constants)
//!
//! A missing TOML file is not an error: the service logs a warning and
//! starts on defaults. A TOML file that exists but cannot be parsed is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "AQUAWATCH_CONFIG";

pub const ENV_INFERENCE_ENDPOINT: &str = "AQUAWATCH_INFERENCE_ENDPOINT";
pub const ENV_TARGET_MODEL: &str = "AQUAWATCH_TARGET_MODEL";
pub const ENV_INFERENCE_URL: &str = "AQUAWATCH_INFERENCE_URL";
pub const ENV_THRESHOLD_PERCENT: &str = "AQUAWATCH_THRESHOLD_PERCENT";
pub const ENV_MINIMUM_FLOOR: &str = "AQUAWATCH_MINIMUM_FLOOR";
pub const ENV_DATA_FOLDER: &str = "AQUAWATCH_DATA_FOLDER";
pub const ENV_ALERT_WEBHOOK: &str = "AQUAWATCH_ALERT_WEBHOOK";

/// Bootstrap configuration loaded from `aquawatch.toml`
///
/// Every section is optional in the file; absent keys take the defaults below.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub usgs: UsgsConfig,
    pub weather: WeatherConfig,
    pub inference: InferenceConfig,
    pub anomaly: AnomalyConfig,
    pub storage: StorageConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5780 }
    }
}

/// Time-series provider (USGS water services)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UsgsConfig {
    pub base_url: String,
    /// Per-request timeout; each site gets its own
    pub timeout_secs: u64,
    /// Upper bound on in-flight per-site requests within one batch
    pub max_concurrency: usize,
}

impl Default for UsgsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://waterservices.usgs.gov".to_string(),
            timeout_secs: 10,
            max_concurrency: 4,
        }
    }
}

impl UsgsConfig {
    pub fn timeout(&self) -> Duration {
        crate::time::secs_to_duration(self.timeout_secs)
    }
}

/// Weather lookup (National Weather Service)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    /// api.weather.gov rejects requests without a descriptive agent
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.weather.gov".to_string(),
            user_agent: "aquawatch/1.0 (contact: dev@aquawatch)".to_string(),
            timeout_secs: 10,
        }
    }
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        crate::time::secs_to_duration(self.timeout_secs)
    }
}

/// Inference endpoint configuration
///
/// `endpoint` and `target_model` have no defaults: a run that needs them and
/// finds them empty fails with a configuration error.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub endpoint: Option<String>,
    pub target_model: Option<String>,
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            endpoint: None,
            target_model: None,
            timeout_secs: 60,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        crate::time::secs_to_duration(self.timeout_secs)
    }
}

/// Anomaly classification policy
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Percent-change threshold, in percentage points
    pub threshold_percent: f64,
    /// Predictions at or below this absolute value never alert
    pub minimum_floor: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            threshold_percent: 20.0,
            minimum_floor: 15.0,
        }
    }
}

/// Dataset storage
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Folder backing the blob store; unset keeps datasets in memory
    pub data_folder: Option<PathBuf>,
}

/// Alert notification
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AlertsConfig {
    /// Webhook receiving `{subject, message}`; unset logs alerts instead
    pub webhook_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let config = load_toml_config(path)?;
                info!("Loaded TOML configuration from {}", path.display());
                config
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Self::default()
            }
            None => {
                warn!("No config file found, using built-in defaults");
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `AQUAWATCH_*` environment variables onto this configuration
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_non_empty(ENV_INFERENCE_ENDPOINT) {
            self.inference.endpoint = Some(v);
        }
        if let Some(v) = env_non_empty(ENV_TARGET_MODEL) {
            self.inference.target_model = Some(v);
        }
        if let Some(v) = env_non_empty(ENV_INFERENCE_URL) {
            self.inference.base_url = v;
        }
        if let Some(v) = env_non_empty(ENV_THRESHOLD_PERCENT) {
            self.anomaly.threshold_percent = parse_f64(ENV_THRESHOLD_PERCENT, &v)?;
        }
        if let Some(v) = env_non_empty(ENV_MINIMUM_FLOOR) {
            self.anomaly.minimum_floor = parse_f64(ENV_MINIMUM_FLOOR, &v)?;
        }
        if let Some(v) = env_non_empty(ENV_DATA_FOLDER) {
            self.storage.data_folder = Some(PathBuf::from(v));
        }
        if let Some(v) = env_non_empty(ENV_ALERT_WEBHOOK) {
            self.alerts.webhook_url = Some(v);
        }
        Ok(())
    }

    /// Reject values no component can run with
    pub fn validate(&self) -> Result<()> {
        if !self.anomaly.threshold_percent.is_finite() || self.anomaly.threshold_percent < 0.0 {
            return Err(Error::Config(format!(
                "anomaly.threshold_percent must be a non-negative number, got {}",
                self.anomaly.threshold_percent
            )));
        }
        if !self.anomaly.minimum_floor.is_finite() {
            return Err(Error::Config(format!(
                "anomaly.minimum_floor must be finite, got {}",
                self.anomaly.minimum_floor
            )));
        }
        if self.usgs.max_concurrency == 0 {
            return Err(Error::Config(
                "usgs.max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed for {}: {}", path.display(), e)))
}

/// Locate the config file
///
/// **Priority:** command-line path → `AQUAWATCH_CONFIG` → `~/.config/aquawatch/aquawatch.toml`.
/// Returns `None` when no candidate is named and the user-level file does not exist.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env_non_empty(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir()
        .map(|d| d.join("aquawatch").join("aquawatch.toml"))
        .filter(|p| p.exists())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_f64(name: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|e| Error::Config(format!("{} is not a number ({}): {}", name, value, e)))
}
