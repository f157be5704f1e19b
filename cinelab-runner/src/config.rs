//! Serializable pipeline configuration.
//!
//! The configuration is constructed once (from TOML or defaults), validated,
//! and passed by reference into every component — no global mutable state.
//! The API credential is deliberately not part of the file format; it comes
//! from the environment.

use cinelab_core::data::retry::RetryPolicy;
use cinelab_core::data::tmdb::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Record identifiers fetched when the config does not name any.
pub const DEFAULT_RECORD_IDS: [u64; 18] = [
    299534, 19995, 140607, 299536, 597, 135397, 420818, 24428, 168259, 99861, 284054, 12445,
    181808, 330457, 351286, 109445, 321612, 260513,
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub quality: QualitySection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// Remote catalog endpoint and retry shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogSection {
    pub base_url: String,
    /// Record identifiers to fetch, in order. Must be positive.
    pub record_ids: Vec<u64>,
    pub timeout_secs: u64,
    /// Total attempts per record, including the first.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Pause between requests, honored regardless of outcome.
    pub request_delay_ms: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            record_ids: DEFAULT_RECORD_IDS.to_vec(),
            timeout_secs: 30,
            max_attempts: 4,
            base_backoff_ms: 500,
            max_backoff_ms: 8000,
            request_delay_ms: 250,
        }
    }
}

/// Quality gating and metric thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualitySection {
    /// Quality score below this logs a warning; the run continues.
    pub min_score_pct: f64,
    /// Minimum budget (millions) for ROI to be trusted.
    pub roi_budget_floor_musd: f64,
    /// IQR multiplier for ROI outlier flagging.
    pub outlier_iqr_multiplier: f64,
}

impl Default for QualitySection {
    fn default() -> Self {
        Self {
            min_score_pct: 60.0,
            roi_budget_floor_musd: 10.0,
            outlier_iqr_multiplier: 3.0,
        }
    }
}

/// Resumption policy and artifact locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    /// Reuse a complete persisted artifact instead of re-running its stage.
    pub skip_existing: bool,
    pub data_dir: PathBuf,
    pub report_dir: PathBuf,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            skip_existing: true,
            data_dir: PathBuf::from("data"),
            report_dir: PathBuf::from("reports"),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.record_ids.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one record identifier is required".to_string(),
            ));
        }
        if self.catalog.record_ids.contains(&0) {
            return Err(ConfigError::Invalid(
                "record identifiers must be positive".to_string(),
            ));
        }
        if self.catalog.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.catalog.base_backoff_ms > self.catalog.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "base_backoff_ms must not exceed max_backoff_ms".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.quality.min_score_pct) {
            return Err(ConfigError::Invalid(
                "min_score_pct must be between 0 and 100".to_string(),
            ));
        }
        if self.quality.roi_budget_floor_musd < 0.0 {
            return Err(ConfigError::Invalid(
                "roi_budget_floor_musd must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.catalog.max_attempts,
            base_delay: Duration::from_millis(self.catalog.base_backoff_ms),
            max_delay: Duration::from_millis(self.catalog.max_backoff_ms),
        }
    }

    /// Build the retrieval client configuration with the given credential.
    pub fn client_config(&self, api_key: String) -> ClientConfig {
        ClientConfig {
            base_url: self.catalog.base_url.clone(),
            api_key,
            timeout: Duration::from_secs(self.catalog.timeout_secs),
            retry: self.retry_policy(),
            request_delay: Duration::from_millis(self.catalog.request_delay_ms),
        }
    }
}

/// Resolve the API credential from the environment. Absence is fatal.
pub fn resolve_credential() -> Result<String, ConfigError> {
    match std::env::var("TMDB_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(ConfigError::Invalid(
            "TMDB_API_KEY is not set — the pipeline cannot run without a credential".to_string(),
        )),
    }
}
