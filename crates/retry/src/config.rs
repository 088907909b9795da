//! Retry configuration
//!
//! Everything a client needs to build its retry strategy, in one record
//! that can be read from TOML:
//!
//! ```toml
//! mode = "adaptive"
//! max_attempts = 5
//!
//! [backoff]
//! initial_delay = 50      # milliseconds
//! max_backoff = 20000
//!
//! [token_bucket]
//! max_capacity = 500
//!
//! [rate_limiter]
//! beta = 0.7
//! ```
//!
//! Omitted fields take their defaults.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backoff::ExponentialBackoffWithJitterOptions;
use crate::constants::DEFAULT_MAX_ATTEMPTS;
use crate::error::ConfigError;
use crate::rate_limit::AdaptiveRateLimiterConfig;
use crate::strategy::StandardRetryStrategyOptions;
use crate::token_bucket::StandardRetryTokenBucketOptions;

/// Which strategy a client uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    #[default]
    Standard,
    Adaptive,
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::Adaptive => f.write_str("adaptive"),
        }
    }
}

impl FromStr for RetryMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(ConfigError::invalid(
                "mode",
                format!("unknown retry mode `{other}`, expected `standard` or `adaptive`"),
            )),
        }
    }
}

/// Top-level retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub mode: RetryMode,
    /// Attempts allowed per call, first attempt included
    pub max_attempts: u32,
    pub backoff: ExponentialBackoffWithJitterOptions,
    pub token_bucket: StandardRetryTokenBucketOptions,
    /// Only consulted in adaptive mode
    pub rate_limiter: AdaptiveRateLimiterConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            mode: RetryMode::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: ExponentialBackoffWithJitterOptions::default(),
            token_bucket: StandardRetryTokenBucketOptions::default(),
            rate_limiter: AdaptiveRateLimiterConfig::default(),
        }
    }
}

impl RetryConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), mode = %config.mode, "loaded retry configuration");
        Ok(config)
    }

    /// Async variant of [`Self::from_path`]
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&content)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        StandardRetryStrategyOptions { max_attempts: self.max_attempts }.validate()?;
        self.backoff.validate()?;
        self.token_bucket.validate()?;
        self.rate_limiter.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for config.
    use std::time::Duration;

    use super::*;

    /// Validates that an empty document yields the defaults.
    #[test]
    fn test_empty_document_is_default() {
        let config = RetryConfig::from_toml_str("").unwrap();
        assert_eq!(config, RetryConfig::default());
        assert_eq!(config.mode, RetryMode::Standard);
        assert_eq!(config.max_attempts, 3);
    }

    /// Validates a partial document overrides only what it names.
    ///
    /// Assertions:
    /// - Durations are read as milliseconds.
    /// - Unnamed fields keep their defaults.
    #[test]
    fn test_partial_document() {
        let config = RetryConfig::from_toml_str(
            r#"
            mode = "adaptive"
            max_attempts = 5

            [backoff]
            initial_delay = 50
            jitter = 0.0

            [token_bucket]
            max_capacity = 100
            timeout_retry_cost = 10

            [rate_limiter]
            measurement_bucket = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, RetryMode::Adaptive);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff.initial_delay, Duration::from_millis(50));
        assert_eq!(config.backoff.max_backoff, Duration::from_secs(20));
        assert_eq!(config.token_bucket.max_capacity, 100);
        assert_eq!(config.token_bucket.timeout_retry_cost, 10);
        assert_eq!(config.token_bucket.retry_cost, 5);
        assert_eq!(config.rate_limiter.measurement_bucket, Duration::from_millis(250));
        assert!((config.rate_limiter.beta - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = RetryConfig::from_toml_str("max_attempts = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "max_attempts", .. }));

        let err = RetryConfig::from_toml_str("[backoff]\njitter = 2.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "jitter", .. }));

        let err = RetryConfig::from_toml_str("mode = \"legacy\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Adaptive".parse::<RetryMode>().unwrap(), RetryMode::Adaptive);
        assert_eq!(" standard ".parse::<RetryMode>().unwrap(), RetryMode::Standard);
        assert!("legacy".parse::<RetryMode>().is_err());
        assert_eq!(RetryMode::Adaptive.to_string(), "adaptive");
    }

    /// Validates loading from disk, synchronously and asynchronously.
    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.toml");
        std::fs::write(&path, "mode = \"adaptive\"\n").unwrap();

        let sync = RetryConfig::from_path(&path).unwrap();
        let async_loaded = RetryConfig::load_from_file(&path).await.unwrap();
        assert_eq!(sync.mode, RetryMode::Adaptive);
        assert_eq!(sync, async_loaded);

        let missing = RetryConfig::from_path(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));
    }
}
