//! Runtime limits, loadable from TOML
//!
//! ```toml
//! max_call_depth = 200
//! max_index_chain = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Nested native calls allowed before `StackOverflow`
pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// Chained `__index` tables followed before giving up
pub const DEFAULT_MAX_INDEX_CHAIN: usize = 2000;

/// Tunable limits for an execution context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Native call depth limit; tail calls do not count against it
    pub max_call_depth: usize,

    /// Maximum length of an `__index` table chain
    pub max_index_chain: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_index_chain: DEFAULT_MAX_INDEX_CHAIN,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {field} must be at least 1")]
    Zero { field: &'static str },
}

impl VmConfig {
    /// Parse from TOML text; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: VmConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_call_depth == 0 {
            return Err(ConfigError::Zero {
                field: "max_call_depth",
            });
        }
        if self.max_index_chain == 0 {
            return Err(ConfigError::Zero {
                field: "max_index_chain",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = VmConfig::from_toml_str("max_call_depth = 50").unwrap();
        assert_eq!(config.max_call_depth, 50);
        assert_eq!(config.max_index_chain, DEFAULT_MAX_INDEX_CHAIN);

        let config = VmConfig::from_toml_str("").unwrap();
        assert_eq!(config, VmConfig::default());
    }

    #[test]
    fn test_rejects_zero() {
        let err = VmConfig::from_toml_str("max_index_chain = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Zero { .. }));
    }

    #[test]
    fn test_rejects_bad_types() {
        let err = VmConfig::from_toml_str("max_call_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = VmConfig::load("/nonexistent/lunaria.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
