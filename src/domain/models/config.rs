use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Main configuration structure for the harness
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HarnessConfig {
    /// Milliseconds after which a running job is forcibly stopped
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Degree of parallelism handed to the job
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Milliseconds a cancelled job may take to wind down before it is aborted
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_timeout_ms() -> u64 {
    4000
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

const fn default_cancel_grace_ms() -> u64 {
    1000
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            parallelism: default_parallelism(),
            cancel_grace_ms: default_cancel_grace_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Replace the timeout, shortening the cancel grace period if it would
    /// otherwise outlast the new timeout.
    pub fn override_timeout(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
        self.cancel_grace_ms = self.cancel_grace_ms.min(timeout_ms);
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for stderr
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for JSON log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation policy for file output
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Daily,
    Hourly,
    #[default]
    Never,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_timeout_override_clamps_grace() {
        let mut config = HarnessConfig::default();
        config.override_timeout(500);
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.cancel_grace_ms, 500);
    }

    #[test]
    fn test_long_timeout_override_keeps_grace() {
        let mut config = HarnessConfig {
            cancel_grace_ms: 250,
            ..HarnessConfig::default()
        };
        config.override_timeout(60_000);
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.cancel_grace_ms, 250);
    }
}
