//! Coordinator runtime configuration.
//!
//! # Responsibility
//! - Collect storage, logging and notifier settings from the environment or
//!   a JSON document.
//! - Reject malformed values before any component is wired.
//!
//! # Invariants
//! - Missing keys fall back to defaults; present-but-invalid keys fail.
//! - Environment access goes through an injectable lookup so tests never
//!   touch the process environment.

use crate::logging::{default_log_level, normalize_level};
use crate::service::group_service::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "STUDYGROUP_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "STUDYGROUP_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "STUDYGROUP_LOG_DIR";
pub const ENV_NOTIFY_URL: &str = "STUDYGROUP_NOTIFY_URL";
pub const ENV_NOTIFY_TIMEOUT_MS: &str = "STUDYGROUP_NOTIFY_TIMEOUT_MS";

/// Notifier timeout used when none is configured.
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 3_000;

/// Settings needed to wire storage, logging and notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// SQLite file; `None` selects an in-memory database.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory; `None` disables file logging.
    pub log_dir: Option<String>,
    /// Notification service URL; `None` logs notifications locally.
    pub notify_endpoint: Option<String>,
    pub notify_timeout_ms: u64,
    pub page_size_default: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            notify_endpoint: None,
            notify_timeout_ms: DEFAULT_NOTIFY_TIMEOUT_MS,
            page_size_default: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CoordinatorConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        config.log_dir = read(ENV_LOG_DIR);
        config.notify_endpoint = read(ENV_NOTIFY_URL);
        if let Some(timeout) = read(ENV_NOTIFY_TIMEOUT_MS) {
            config.notify_timeout_ms =
                timeout
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_NOTIFY_TIMEOUT_MS,
                        value: timeout.clone(),
                    })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON document; absent fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Json(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges, the log level name and the endpoint scheme.
    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(|_| ConfigError::InvalidValue {
            key: ENV_LOG_LEVEL,
            value: self.log_level.clone(),
        })?;
        if self.notify_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_NOTIFY_TIMEOUT_MS,
                value: "0".to_string(),
            });
        }
        if self.page_size_default == 0 || self.page_size_default > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                key: "page_size_default",
                value: self.page_size_default.to_string(),
            });
        }
        if let Some(endpoint) = &self.notify_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    key: ENV_NOTIFY_URL,
                    value: endpoint.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}

/// Configuration failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
    Json(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid configuration value for {key}: `{value}`")
            }
            Self::Json(message) => write!(f, "invalid configuration document: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| values.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = CoordinatorConfig::from_lookup(lookup_from(&[])).expect("defaults are valid");
        assert_eq!(config, CoordinatorConfig::default());
        assert_eq!(config.notify_timeout(), Duration::from_millis(3_000));
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = CoordinatorConfig::from_lookup(lookup_from(&[
            (ENV_DB_PATH, "/tmp/groups.sqlite3"),
            (ENV_LOG_LEVEL, "warn"),
            (ENV_NOTIFY_URL, "http://127.0.0.1:9000/notifications"),
            (ENV_NOTIFY_TIMEOUT_MS, " 750 "),
        ]))
        .expect("overrides should be valid");

        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/groups.sqlite3")));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.notify_timeout_ms, 750);
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        let err = CoordinatorConfig::from_lookup(lookup_from(&[(ENV_NOTIFY_TIMEOUT_MS, "soon")]))
            .expect_err("non-numeric timeout should fail");
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_NOTIFY_TIMEOUT_MS,
                value: "soon".to_string(),
            }
        );
    }

    #[test]
    fn json_document_fills_missing_fields_with_defaults() {
        let config = CoordinatorConfig::from_json_str(r#"{"page_size_default": 20}"#)
            .expect("partial document should parse");
        assert_eq!(config.page_size_default, 20);
        assert_eq!(config.notify_timeout_ms, DEFAULT_NOTIFY_TIMEOUT_MS);

        let err = CoordinatorConfig::from_json_str(r#"{"pageSize": 20}"#)
            .expect_err("unknown field should fail");
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
