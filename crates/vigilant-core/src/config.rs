//! Client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::metrics::DEFAULT_METRICS_CAPACITY;
use crate::notification::DEFAULT_NOTIFICATION_CAPACITY;
use crate::result::THREAT_SCORE_THRESHOLD;

/// Name of the config file looked up under the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable that overrides [`ClientConfig::base_url`].
pub const URL_ENV_VAR: &str = "VIGILANT_URL";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Configuration for the dashboard client.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the dashboard server, without a trailing slash.
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    pub base_url: String,

    /// Interval between progress polls while a scan is running.
    #[builder(default = "500")]
    pub poll_interval_ms: u64,

    /// Interval between metric samples in `watch` mode.
    #[builder(default = "1000")]
    pub metrics_interval_ms: u64,

    /// Number of samples kept by the metrics ring buffer.
    #[builder(default = "DEFAULT_METRICS_CAPACITY")]
    pub metrics_capacity: usize,

    /// Number of notifications kept by the notification center.
    #[builder(default = "DEFAULT_NOTIFICATION_CAPACITY")]
    pub notification_capacity: usize,

    /// Client-side timeout for assistant requests.
    #[builder(default = "15")]
    pub assistant_timeout_secs: u64,

    /// Progress display truncates file names longer than this.
    #[builder(default = "20")]
    pub display_name_limit: usize,

    /// Score at or above which a result counts as a threat.
    #[builder(default = "THREAT_SCORE_THRESHOLD")]
    pub threat_threshold: u8,
}

impl ClientConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref url) = self.base_url {
            if url.trim().is_empty() {
                return Err("Base URL cannot be empty".to_string());
            }
        }
        let nonzero = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("metrics_interval_ms", self.metrics_interval_ms),
            ("assistant_timeout_secs", self.assistant_timeout_secs),
        ];
        for (name, value) in nonzero {
            if value == Some(0) {
                return Err(format!("{name} must be greater than zero"));
            }
        }
        if self.metrics_capacity == Some(0) || self.notification_capacity == Some(0) {
            return Err("Capacities must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Create a new config builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Create a default config pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load a config from a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config from the platform config directory if present,
    /// otherwise use defaults. The URL environment variable is applied last.
    pub fn discover() -> Result<Self, ConfigError> {
        let config = match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path)?,
            _ => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Path of the default config file, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vigilant").join(CONFIG_FILE_NAME))
    }

    /// Apply overrides from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(URL_ENV_VAR) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        self
    }

    /// Check invariants that the builder enforces, for configs loaded from disk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let builder = ClientConfigBuilder {
            base_url: Some(self.base_url.clone()),
            poll_interval_ms: Some(self.poll_interval_ms),
            metrics_interval_ms: Some(self.metrics_interval_ms),
            metrics_capacity: Some(self.metrics_capacity),
            notification_capacity: Some(self.notification_capacity),
            assistant_timeout_secs: Some(self.assistant_timeout_secs),
            display_name_limit: Some(self.display_name_limit),
            threat_threshold: Some(self.threat_threshold),
        };
        builder.validate().map_err(ConfigError::Invalid)
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    pub fn assistant_timeout(&self) -> Duration {
        Duration::from_secs(self.assistant_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 500,
            metrics_interval_ms: 1000,
            metrics_capacity: DEFAULT_METRICS_CAPACITY,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            assistant_timeout_secs: 15,
            display_name_limit: 20,
            threat_threshold: THREAT_SCORE_THRESHOLD,
        }
    }
}
