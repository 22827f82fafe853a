//! Validation engine configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! YAML file named by `LIBPROVISION_CONFIG`, and individual environment
//! variables:
//! - `LIBPROVISION_MIN_INODE_LIMIT`: smallest accepted `inodeLimit`.
//!   Defaults to `1024`.
//! - `LIBPROVISION_ORACLE_LOOKUPS`: set to `0` to skip the principal,
//!   filesystem and base-path lookups even when an oracle is supplied.
//!   Defaults to `1`.

use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const ENV_CONFIG_PATH: &str = "LIBPROVISION_CONFIG";
pub const ENV_MIN_INODE_LIMIT: &str = "LIBPROVISION_MIN_INODE_LIMIT";
pub const ENV_ORACLE_LOOKUPS: &str = "LIBPROVISION_ORACLE_LOOKUPS";

/// Smallest inode limit the backend accepts for an independent fileset.
pub const DEFAULT_MIN_INODE_LIMIT: u64 = 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: String, value: String },
}

/// Tunables of the [`ValidationEngine`](crate::engine::ValidationEngine).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Inode limits below this value are denied with `InodeLimitTooSmall`.
    pub min_inode_limit: u64,
    /// Whether oracle-backed rules run when an oracle is supplied.
    pub oracle_lookups: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_inode_limit: DEFAULT_MIN_INODE_LIMIT,
            oracle_lookups: true,
        }
    }
}

impl ValidationConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Overlay environment overrides using `lookup` to read variables.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MIN_INODE_LIMIT) {
            self.min_inode_limit = value.parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_MIN_INODE_LIMIT.to_owned(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_ORACLE_LOOKUPS) {
            self.oracle_lookups = value != "0";
        }
        Ok(self)
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) if !path.is_empty() => Self::from_yaml_file(path)?,
            _ => Self::default(),
        };
        base.with_env_overrides(|key| std::env::var(key).ok())
    }
}

/// Process-wide configuration, read from the environment at first access.
pub static VALIDATION_CONFIG: LazyLock<ValidationConfig> =
    LazyLock::new(|| match ValidationConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "invalid validation config, falling back to defaults");
            ValidationConfig::default()
        }
    });

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = ValidationConfig::default();
        assert_eq!(config.min_inode_limit, 1024);
        assert!(config.oracle_lookups);
    }

    #[test]
    fn yaml_file_with_partial_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "oracleLookups: false").unwrap();

        let config = ValidationConfig::from_yaml_file(file.path()).unwrap();
        assert!(!config.oracle_lookups);
        assert_eq!(config.min_inode_limit, DEFAULT_MIN_INODE_LIMIT);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ValidationConfig::from_yaml_file("/nonexistent/libprovision.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn env_overrides() {
        let env = HashMap::from([
            (ENV_MIN_INODE_LIMIT, "4096".to_owned()),
            (ENV_ORACLE_LOOKUPS, "0".to_owned()),
        ]);
        let config = ValidationConfig::default()
            .with_env_overrides(|k| env.get(k).cloned())
            .unwrap();
        assert_eq!(config.min_inode_limit, 4096);
        assert!(!config.oracle_lookups);
    }

    #[test]
    fn bad_env_value() {
        let err = ValidationConfig::default()
            .with_env_overrides(|k| (k == ENV_MIN_INODE_LIMIT).then(|| "lots".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }
}
