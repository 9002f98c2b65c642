//! Process-wide pipeline settings.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Marks the designated test environment.
pub const TEST_ENV_ENV_NAME: &str = "REPLICAFLOW_TEST_ENV";
/// Root directory of registry files.
pub const REGISTRY_PATH_ENV_NAME: &str = "REPLICAFLOW_REGISTRY_PATH";
/// Default log level.
pub const LOG_LEVEL_ENV_NAME: &str = "REPLICAFLOW_LOG_LEVEL";
/// Emit JSON logs.
pub const LOG_JSON_ENV_NAME: &str = "REPLICAFLOW_LOG_JSON";

/// Settings shared by every task run in a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Designated test environment: reporting and monitors become no-ops
    /// and layer tokens get a `_test` suffix.
    #[serde(default)]
    pub test_environment: bool,
    /// Root directory holding registry files; `None` disables the registry.
    #[serde(default)]
    pub registry_path: Option<PathBuf>,
    /// Subdirectory of `registry_path` holding replication sources.
    #[serde(default = "default_registry_prefix")]
    pub registry_prefix: String,
    /// Write run rows through the run reporter.
    #[serde(default = "default_true")]
    pub report_runs: bool,
    /// Send quality metrics through the metric reporter.
    #[serde(default = "default_true")]
    pub report_metrics: bool,
    /// Metric name the quality gate reports under.
    #[serde(default = "default_quality_metric_name")]
    pub quality_metric_name: String,
    /// Channel ancillary alerts are sent to.
    #[serde(default = "default_alert_channel")]
    pub alert_channel: String,
    /// Default log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON logs.
    #[serde(default)]
    pub log_json: bool,
}

fn default_registry_prefix() -> String {
    "batch_pipeline".to_string()
}

fn default_true() -> bool {
    true
}

fn default_quality_metric_name() -> String {
    "data_quality_check".to_string()
}

fn default_alert_channel() -> String {
    "data-alerts".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            test_environment: false,
            registry_path: None,
            registry_prefix: default_registry_prefix(),
            report_runs: true,
            report_metrics: true,
            quality_metric_name: default_quality_metric_name(),
            alert_channel: default_alert_channel(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, ConfigurationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigurationError::new(format!(
            "Invalid boolean `{raw}` for {name}; expected true or false"
        ))),
    }
}

impl PipelineSettings {
    /// Creates settings with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(raw) = lookup(TEST_ENV_ENV_NAME) {
            settings.test_environment = parse_flag(TEST_ENV_ENV_NAME, &raw)?;
        }
        if let Some(raw) = lookup(REGISTRY_PATH_ENV_NAME).filter(|s| !s.trim().is_empty()) {
            settings.registry_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup(LOG_LEVEL_ENV_NAME).filter(|s| !s.trim().is_empty()) {
            settings.log_level = raw;
        }
        if let Some(raw) = lookup(LOG_JSON_ENV_NAME) {
            settings.log_json = parse_flag(LOG_JSON_ENV_NAME, &raw)?;
        }
        Ok(settings)
    }

    /// Marks the designated test environment.
    #[must_use]
    pub fn with_test_environment(mut self, test_environment: bool) -> Self {
        self.test_environment = test_environment;
        self
    }

    /// Sets the registry root.
    #[must_use]
    pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    /// Toggles run and metric reporting independently.
    #[must_use]
    pub fn with_reporting(mut self, runs: bool, metrics: bool) -> Self {
        self.report_runs = runs;
        self.report_metrics = metrics;
        self
    }

    /// Sets the alert channel.
    #[must_use]
    pub fn with_alert_channel(mut self, channel: impl Into<String>) -> Self {
        self.alert_channel = channel.into();
        self
    }

    /// Directory the registry loader reads, if a registry is configured.
    #[must_use]
    pub fn registry_root(&self) -> Option<PathBuf> {
        self.registry_path
            .as_ref()
            .map(|path| path.join(&self.registry_prefix))
    }
}
