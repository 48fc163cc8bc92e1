//! TOML-backed configuration for the triage orchestrator
//!
//! All sections and fields are optional in the file; missing values fall back
//! to the defaults below.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TriageConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub rates: RatesConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub remediation: RemediationConfig,
}

/// Orchestrator behavior
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Whether event processing starts enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-stage timeout for I/O-bound stages, in seconds
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
}

/// Rate tracker window
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RatesConfig {
    /// Sliding window length in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
}

/// External error-logging endpoint
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// HTTP endpoint to post error events to; empty disables remote logging
    #[serde(default)]
    pub endpoint: String,
}

/// Remediation rule loading
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RemediationConfig {
    /// Whether to start with the built-in default rule set
    #[serde(default = "default_use_default_rules")]
    pub use_default_rules: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_stage_timeout_secs() -> u64 {
    5
}

fn default_window_minutes() -> i64 {
    10
}

fn default_use_default_rules() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            stage_timeout_secs: default_stage_timeout_secs(),
        }
    }
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
        }
    }
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            use_default_rules: default_use_default_rules(),
        }
    }
}

impl TriageConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: TriageConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.stage_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.stage_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.rates.window_minutes <= 0 {
            return Err(ConfigError::ValidationError(
                "rates.window_minutes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
