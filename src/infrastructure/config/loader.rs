use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::HarnessConfig;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid timeout_ms: {0}. Must be at least 1")]
    InvalidTimeout(u64),

    #[error("Invalid parallelism: {0}. Must be between 1 and 1024")]
    InvalidParallelism(usize),

    #[error("Invalid cancel_grace_ms: {0}. Must not exceed timeout_ms ({1})")]
    InvalidCancelGrace(u64, u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

const MAX_PARALLELISM: usize = 1024;
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .sinkcheck/config.yaml (project config)
    /// 3. .sinkcheck/local.yaml (local overrides, optional)
    /// 4. Environment variables (SINKCHECK_* prefix, `__` separates nesting)
    pub fn load() -> Result<HarnessConfig> {
        let config: HarnessConfig = Figment::new()
            .merge(Serialized::defaults(HarnessConfig::default()))
            .merge(Yaml::file(".sinkcheck/config.yaml"))
            .merge(Yaml::file(".sinkcheck/local.yaml"))
            .merge(Env::prefixed("SINKCHECK_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file on top of the defaults
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<HarnessConfig> {
        let config: HarnessConfig = Figment::new()
            .merge(Serialized::defaults(HarnessConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &HarnessConfig) -> Result<(), ConfigError> {
        if config.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(config.timeout_ms));
        }

        if config.parallelism == 0 || config.parallelism > MAX_PARALLELISM {
            return Err(ConfigError::InvalidParallelism(config.parallelism));
        }

        if config.cancel_grace_ms > config.timeout_ms {
            return Err(ConfigError::InvalidCancelGrace(
                config.cancel_grace_ms,
                config.timeout_ms,
            ));
        }

        let level = config.logging.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{LogFormat, RotationPolicy};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.timeout_ms, 4000);
        assert_eq!(config.cancel_grace_ms, 1000);
        assert!(config.parallelism >= 1);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
timeout_ms: 250
parallelism: 4
logging:
  level: debug
  format: json
  rotation: daily
";

        let config: HarnessConfig = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.cancel_grace_ms, 1000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.rotation, RotationPolicy::Daily);
    }

    #[test]
    fn test_load_from_file_merges_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timeout_ms: 9000\ncancel_grace_ms: 200").unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();

        assert_eq!(config.timeout_ms, 9000);
        assert_eq!(config.cancel_grace_ms, 200);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "parallelism: 0").unwrap();

        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid parallelism"));
    }

    #[test]
    fn test_validate_rejects_each_bad_field() {
        let config = HarnessConfig {
            timeout_ms: 0,
            ..HarnessConfig::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTimeout(0))
        ));

        let config = HarnessConfig {
            timeout_ms: 100,
            cancel_grace_ms: 500,
            ..HarnessConfig::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidCancelGrace(500, 100))
        ));

        let mut config = HarnessConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        temp_env::with_vars(
            [
                ("SINKCHECK_TIMEOUT_MS", Some("1234")),
                ("SINKCHECK_LOGGING__LEVEL", Some("warn")),
            ],
            || {
                let config = ConfigLoader::load().expect("env config should load");
                assert_eq!(config.timeout_ms, 1234);
                assert_eq!(config.logging.level, "warn");
            },
        );
    }
}
