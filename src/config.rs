use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Default limit {default} cannot exceed max limit {max}")]
    LimitOrder { default: u32, max: u32 },
}

/// Compiler configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Page size applied to list reads that pass no `limit` and whose type sets none
    #[validate(range(min = 1, message = "Default limit must be at least 1"))]
    pub default_limit: Option<u32>,

    /// Upper bound for any requested `limit` or `first`
    #[validate(range(min = 1, message = "Max limit must be at least 1"))]
    pub max_limit: Option<u32>,

    /// Accept bare field names as aliases of `_EQ` / `_SET` and bare
    /// relationship names as aliases of `_SOME`
    pub allow_deprecated_aliases: bool,

    /// Expose the `_MATCHES` regular-expression operator on string fields
    pub enable_regex: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_limit: None,
            max_limit: None,
            allow_deprecated_aliases: true,
            enable_regex: false,
        }
    }
}

impl CompilerConfig {
    /// Field validation plus the cross-field limit check
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        match (self.default_limit, self.max_limit) {
            (Some(default), Some(max)) if default > max => {
                Err(ConfigError::LimitOrder { default, max })
            }
            _ => Ok(()),
        }
    }

    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            default_limit: parse_optional_env_var("CYPHER_COMPILER_DEFAULT_LIMIT")?,
            max_limit: parse_optional_env_var("CYPHER_COMPILER_MAX_LIMIT")?,
            allow_deprecated_aliases: parse_env_var(
                "CYPHER_COMPILER_ALLOW_DEPRECATED_ALIASES",
                "true",
            )?,
            enable_regex: parse_env_var("CYPHER_COMPILER_ENABLE_REGEX", "false")?,
        };

        config.check()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content.to_string(),
            source: Box::new(e),
        })?;

        config.check()?;
        Ok(config)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

/// Parse an environment variable that has no default
fn parse_optional_env_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|e| ConfigError::Parse {
            field: key.to_string(),
            value,
            source: Box::new(e),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.allow_deprecated_aliases);
        assert!(!config.enable_regex);
        assert_eq!(config.default_limit, None);
    }

    #[test]
    fn test_invalid_limit_range() {
        let config = CompilerConfig {
            max_limit: Some(0), // Invalid
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_above_max_rejected() {
        let config = CompilerConfig {
            default_limit: Some(50),
            max_limit: Some(10),
            ..Default::default()
        };
        assert!(matches!(
            config.check(),
            Err(ConfigError::LimitOrder { default: 50, max: 10 })
        ));
    }

    #[test]
    fn test_yaml_config() {
        let config = CompilerConfig::from_yaml_str(
            "default_limit: 10\nmax_limit: 100\nenable_regex: true\n",
        )
        .unwrap();
        assert_eq!(config.default_limit, Some(10));
        assert_eq!(config.max_limit, Some(100));
        assert!(config.enable_regex);
        // Omitted keys keep their defaults
        assert!(config.allow_deprecated_aliases);
    }

    #[test]
    fn test_yaml_config_validation_error() {
        let result = CompilerConfig::from_yaml_str("default_limit: 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
