use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::acquirer::RetryPolicy;

/// Default NWS station (Delaware Municipal Airport, Ohio).
pub const DEFAULT_STATION: &str = "KDLZ";

/// Recorder configuration, loaded from YAML. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// NWS station identifier, e.g. `KBOS`.
    pub station: String,
    /// Full observation URL; overrides the one derived from `station`.
    pub observation_url: Option<String>,
    /// `Accept` request header.
    pub accept: String,
    /// `User-Agent` request header. api.weather.gov asks for contact details here.
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// SQLite database path; defaults to `~/.weather-recorder/observations.db`.
    pub database_path: Option<PathBuf>,
    /// Seconds between cycles when no `cron` expression is set.
    pub sample_rate_secs: u64,
    /// Cron expression (5 or 6 fields) for cycle start times.
    pub cron: Option<String>,
    pub retry: RetryConfig,
}

/// Retry settings, in whole seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub min_wait_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            station: DEFAULT_STATION.to_string(),
            observation_url: None,
            accept: "application/ld+json".to_string(),
            user_agent: concat!("(", env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"), ")")
                .to_string(),
            request_timeout_secs: 30,
            database_path: None,
            sample_rate_secs: 3600,
            cron: None,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait_secs: 5,
            max_wait_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.observation_url.is_none() && self.station.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "either station or observation_url must be set".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.min_wait_secs > self.retry.max_wait_secs {
            return Err(ConfigError::Invalid(format!(
                "retry.min_wait_secs ({}) exceeds retry.max_wait_secs ({})",
                self.retry.min_wait_secs, self.retry.max_wait_secs
            )));
        }
        if self.cron.is_none() && self.sample_rate_secs == 0 {
            return Err(ConfigError::Invalid(
                "sample_rate_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn observation_url(&self) -> String {
        match &self.observation_url {
            Some(url) => url.clone(),
            None => format!(
                "https://api.weather.gov/stations/{}/observations/latest",
                self.station.trim()
            ),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => path.clone(),
            None => dirs::home_dir()
                .map(|home| home.join(".weather-recorder"))
                .unwrap_or_default()
                .join("observations.db"),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            min_wait: Duration::from_secs(self.retry.min_wait_secs),
            max_wait: Duration::from_secs(self.retry.max_wait_secs),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
