//! Configuration management for the quota gate.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QuotaGateError, Result};

/// Environment variable prefix for configuration overrides,
/// e.g. `QUOTA_GATE__QUOTA__LIMIT=20`.
pub const ENV_PREFIX: &str = "QUOTA_GATE";

/// Main configuration for the quota gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Quota configuration
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the gate orders the limit check and the increment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Read, compare, then increment. Concurrent callers can overrun the
    /// limit by up to (racers - 1) within a window.
    #[default]
    CheckThenRecord,
    /// Increment first, compare the returned value, and compensate with a
    /// decrement when over the limit. Hard ceiling.
    RecordThenCheck,
}

/// Quota configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Operations allowed per key per window
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window length in seconds, anchored to wall-clock boundaries
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u32,

    /// Check/record ordering
    #[serde(default)]
    pub admission: AdmissionMode,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_seconds: default_window_seconds(),
            admission: AdmissionMode::default(),
        }
    }
}

fn default_limit() -> u64 {
    10
}

fn default_window_seconds() -> u32 {
    60
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL. The in-memory store is used when unset.
    #[serde(default)]
    pub url: Option<String>,

    /// Per-round-trip timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    500
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GateConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| QuotaGateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional YAML file, then apply
    /// `QUOTA_GATE__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path.to_path_buf()).format(::config::FileFormat::Yaml),
            );
        }
        let config: GateConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the gate cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.quota.limit == 0 {
            return Err(QuotaGateError::Config("quota.limit must be positive".into()));
        }
        if self.quota.window_seconds == 0 || self.quota.window_seconds > 86_400 {
            return Err(QuotaGateError::Config(format!(
                "quota.window_seconds must be between 1 and 86400, got {}",
                self.quota.window_seconds
            )));
        }
        if self.store.timeout_ms == 0 {
            return Err(QuotaGateError::Config("store.timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.quota.limit, 10);
        assert_eq!(config.quota.window_seconds, 60);
        assert_eq!(config.quota.admission, AdmissionMode::CheckThenRecord);
        assert!(config.store.url.is_none());
        assert_eq!(config.store.timeout(), Duration::from_millis(500));
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
quota:
  limit: 25
  admission: record_then_check
store:
  url: redis://127.0.0.1:6379
"#;
        let config = GateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.quota.limit, 25);
        assert_eq!(config.quota.window_seconds, 60);
        assert_eq!(config.quota.admission, AdmissionMode::RecordThenCheck);
        assert_eq!(config.store.url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.store.timeout_ms, 500);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_yaml_rejects_zero_limit() {
        let err = GateConfig::from_yaml("quota:\n  limit: 0\n").unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_validate_window_bounds() {
        let mut config = GateConfig::default();
        config.quota.window_seconds = 0;
        assert!(config.validate().is_err());

        config.quota.window_seconds = 86_401;
        assert!(config.validate().is_err());

        config.quota.window_seconds = 3600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("quota-gate-{}.yaml", std::process::id()));
        std::fs::write(&path, "quota:\n  limit: 3\n  window_seconds: 30\nlogging:\n  format: json\n").unwrap();

        let config = GateConfig::load(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.quota.limit, 3);
        assert_eq!(config.quota.window_seconds, 30);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.store.timeout_ms, 500);
    }

    #[test]
    fn test_from_yaml_unknown_admission() {
        let result = GateConfig::from_yaml("quota:\n  admission: sliding\n");
        assert!(result.is_err());
    }
}
