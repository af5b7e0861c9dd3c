//! Core runtime configuration.
//!
//! # Responsibility
//! - Describe host-tunable settings (logging, store sharding).
//! - Load them from serde-compatible documents or the process environment.
//!
//! # Invariants
//! - `validate()` must pass before a config is used to build core components.
//! - Missing fields fall back to documented defaults.

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "CAPSLOT_LOG_LEVEL";
/// Environment variable overriding the absolute log directory.
pub const ENV_LOG_DIR: &str = "CAPSLOT_LOG_DIR";
/// Environment variable overriding the store shard count.
pub const ENV_STORE_SHARDS: &str = "CAPSLOT_STORE_SHARDS";

/// Default shard count for the context-local store.
pub const DEFAULT_SHARD_COUNT: usize = 16;
const MAX_SHARD_COUNT: usize = 1024;

/// Top-level core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Log level (`trace|debug|info|warn|error`).
    pub log_level: String,
    /// Absolute directory for rolling log files; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    pub store: StoreConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            store: StoreConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Builds a config from defaults overridden by `CAPSLOT_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            if !dir.trim().is_empty() {
                config.log_dir = Some(PathBuf::from(dir.trim()));
            }
        }
        if let Some(raw) = lookup(ENV_STORE_SHARDS) {
            config.store.shard_count = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber {
                    field: ENV_STORE_SHARDS,
                    value: raw.clone(),
                })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validates all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::EmptyLogLevel);
        }
        if normalize_level(&self.log_level).is_err() {
            return Err(ConfigError::UnsupportedLogLevel(self.log_level.clone()));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::RelativeLogDir(dir.clone()));
            }
        }
        self.store.validate()
    }
}

/// Context-local store settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of lock shards; must be a power of two.
    pub shard_count: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_count == 0
            || !self.shard_count.is_power_of_two()
            || self.shard_count > MAX_SHARD_COUNT
        {
            return Err(ConfigError::InvalidShardCount(self.shard_count));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyLogLevel,
    UnsupportedLogLevel(String),
    RelativeLogDir(PathBuf),
    InvalidShardCount(usize),
    InvalidNumber { field: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyLogLevel => write!(f, "log level must not be empty"),
            Self::UnsupportedLogLevel(level) => write!(
                f,
                "unsupported log level `{level}`; use trace|debug|info|warn|error"
            ),
            Self::RelativeLogDir(dir) => {
                write!(f, "log dir must be an absolute path, got `{}`", dir.display())
            }
            Self::InvalidShardCount(value) => write!(
                f,
                "store shard count must be a power of two in 1..={MAX_SHARD_COUNT}, got {value}"
            ),
            Self::InvalidNumber { field, value } => {
                write!(f, "{field} must be a number, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, CoreConfig, StoreConfig, DEFAULT_SHARD_COUNT, ENV_LOG_DIR, ENV_LOG_LEVEL,
        ENV_STORE_SHARDS,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::default();
        config.validate().expect("default config should validate");
        assert_eq!(config.store.shard_count, DEFAULT_SHARD_COUNT);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn shard_count_must_be_power_of_two() {
        for invalid in [0, 3, 12, 2048] {
            let err = StoreConfig {
                shard_count: invalid,
            }
            .validate()
            .expect_err("invalid shard count must fail");
            assert_eq!(err, ConfigError::InvalidShardCount(invalid));
        }
        StoreConfig { shard_count: 1 }
            .validate()
            .expect("single shard is allowed");
    }

    #[test]
    fn env_overrides_are_applied() {
        let dir = std::env::temp_dir().join("capslot-config");
        let dir_str = dir.to_str().expect("temp dir should be UTF-8").to_string();
        let config = CoreConfig::from_lookup(lookup_from(&[
            (ENV_LOG_LEVEL, "warn"),
            (ENV_LOG_DIR, dir_str.as_str()),
            (ENV_STORE_SHARDS, " 64 "),
        ]))
        .expect("env config should load");

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(dir));
        assert_eq!(config.store.shard_count, 64);
    }

    #[test]
    fn env_rejects_non_numeric_shards() {
        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_STORE_SHARDS, "many")]))
            .expect_err("non-numeric shard count must fail");
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let config = CoreConfig {
            log_dir: Some(PathBuf::from("logs/dev")),
            ..CoreConfig::default()
        };
        let err = config.validate().expect_err("relative dir must fail");
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let config = CoreConfig {
            log_level: "verbose".to_string(),
            ..CoreConfig::default()
        };
        let err = config.validate().expect_err("unknown level must fail");
        assert_eq!(err, ConfigError::UnsupportedLogLevel("verbose".to_string()));

        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_LOG_LEVEL, "verbose")]))
            .expect_err("unknown env level must fail");
        assert!(matches!(err, ConfigError::UnsupportedLogLevel(_)));

        let config = CoreConfig::from_lookup(lookup_from(&[(ENV_LOG_LEVEL, " WARN ")]))
            .expect("level is normalized before validation");
        assert_eq!(config.log_level, " WARN ");
    }
}
