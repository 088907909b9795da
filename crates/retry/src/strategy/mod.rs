//! Retry strategies
//!
//! A strategy runs the attempt loop for one logical call:
//!
//! ```text
//! Attempting(1) ──▶ operation ──▶ policy ──┬─ TerminateAndSucceed ─▶ Succeeded
//!       ▲                                  ├─ TerminateAndFail ────▶ FailedTerminal(error)
//!       │                                  └─ RetryError(kind)
//!       │                                        │ n ≥ max_attempts ─▶ FailedTerminal(MaxAttemptsExceeded)
//!       │                                        │ bucket empty ─────▶ FailedTerminal(InsufficientCapacity)
//!       └──────── sleep(backoff(n)) ◀────────────┘
//! ```
//!
//! [`StandardRetryStrategy`] charges the shared token bucket for every
//! retry. [`AdaptiveRetryStrategy`] additionally feeds every outcome to an
//! [`AdaptiveRateLimiter`](crate::rate_limit::AdaptiveRateLimiter) and
//! pushes the resulting refill rate into the bucket.

mod adaptive;
mod standard;

use std::future::Future;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub use adaptive::AdaptiveRetryStrategy;
pub use standard::StandardRetryStrategy;

use crate::backoff::ExponentialBackoffWithJitter;
use crate::config::{RetryConfig, RetryMode};
use crate::constants::{DEFAULT_MAX_ATTEMPTS, MAX_MAX_ATTEMPTS, MIN_MAX_ATTEMPTS};
use crate::error::{ConfigError, RetryError};
use crate::metrics::RetryMetrics;
use crate::policy::RetryPolicy;
use crate::rate_limit::AdaptiveRateLimiter;
use crate::token_bucket::StandardRetryTokenBucket;

/// Result of a retried call together with its metrics
pub type RetryOutcome<T, E> = (Result<T, RetryError<E>>, RetryMetrics);

/// Runs an operation under a retry policy
#[async_trait]
pub trait RetryStrategy: Send + Sync {
    /// Run `operation` until the policy accepts or rejects an outcome, a
    /// retry limit is hit, or `cancel` fires
    async fn retry_with_cancellation<T, E, P, F, Fut>(
        &self,
        policy: &P,
        operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        T: Send,
        E: Send,
        P: RetryPolicy<T, E> + ?Sized,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send;

    /// Run `operation` with no external cancellation
    async fn retry<T, E, P, F, Fut>(&self, policy: &P, operation: F) -> Result<T, RetryError<E>>
    where
        T: Send,
        E: Send,
        P: RetryPolicy<T, E> + ?Sized,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let cancel = CancellationToken::new();
        self.retry_with_cancellation(policy, operation, &cancel).await
    }
}

/// Options shared by both strategy variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardRetryStrategyOptions {
    /// Attempts allowed per call, first attempt included
    pub max_attempts: u32,
}

impl Default for StandardRetryStrategyOptions {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

impl StandardRetryStrategyOptions {
    /// Start a builder from the defaults
    pub fn builder() -> StandardRetryStrategyOptionsBuilder {
        StandardRetryStrategyOptionsBuilder::default()
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_MAX_ATTEMPTS..=MAX_MAX_ATTEMPTS).contains(&self.max_attempts) {
            return Err(ConfigError::invalid(
                "max_attempts",
                format!(
                    "{} is outside {MIN_MAX_ATTEMPTS}..={MAX_MAX_ATTEMPTS}",
                    self.max_attempts
                ),
            ));
        }
        Ok(())
    }
}

/// Builder for [`StandardRetryStrategyOptions`]
#[derive(Debug, Default)]
pub struct StandardRetryStrategyOptionsBuilder {
    options: StandardRetryStrategyOptions,
}

impl StandardRetryStrategyOptionsBuilder {
    /// Set the attempts allowed per call
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.options.max_attempts = attempts;
        self
    }

    /// Validate and return the options
    pub fn build(self) -> Result<StandardRetryStrategyOptions, ConfigError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

/// Strategy chosen at runtime from a [`RetryConfig`]
#[derive(Debug, Clone)]
pub enum ClientRetryStrategy {
    Standard(StandardRetryStrategy),
    Adaptive(AdaptiveRetryStrategy),
}

impl ClientRetryStrategy {
    /// Build the strategy described by `config`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if any section fails
    /// validation.
    pub fn from_config(config: &RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let options = StandardRetryStrategyOptions { max_attempts: config.max_attempts };
        let bucket = StandardRetryTokenBucket::new(config.token_bucket.clone());
        let backoff = ExponentialBackoffWithJitter::new(config.backoff.clone());
        let standard = StandardRetryStrategy::new(options, bucket, backoff);

        Ok(match config.mode {
            RetryMode::Standard => Self::Standard(standard),
            RetryMode::Adaptive => {
                let limiter = AdaptiveRateLimiter::new(config.rate_limiter.clone());
                Self::Adaptive(AdaptiveRetryStrategy::new(standard, limiter))
            }
        })
    }

    /// Mode this strategy was built for
    pub fn mode(&self) -> RetryMode {
        match self {
            Self::Standard(_) => RetryMode::Standard,
            Self::Adaptive(_) => RetryMode::Adaptive,
        }
    }

    /// The token bucket shared by every call through this strategy
    pub fn token_bucket(&self) -> &StandardRetryTokenBucket {
        match self {
            Self::Standard(strategy) => strategy.token_bucket(),
            Self::Adaptive(strategy) => strategy.token_bucket(),
        }
    }

    /// Like [`RetryStrategy::retry_with_cancellation`], also returning
    /// metrics
    pub async fn retry_with_metrics<T, E, P, F, Fut>(
        &self,
        operation_name: &str,
        policy: &P,
        operation: F,
        cancel: &CancellationToken,
    ) -> RetryOutcome<T, E>
    where
        T: Send,
        E: Send,
        P: RetryPolicy<T, E> + ?Sized,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        match self {
            Self::Standard(strategy) => {
                strategy.retry_with_metrics(operation_name, policy, operation, cancel).await
            }
            Self::Adaptive(strategy) => {
                strategy.retry_with_metrics(operation_name, policy, operation, cancel).await
            }
        }
    }
}

impl FromStr for ClientRetryStrategy {
    type Err = ConfigError;

    /// Default configuration in the named mode
    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        let config = RetryConfig { mode: mode.parse()?, ..RetryConfig::default() };
        Self::from_config(&config)
    }
}

#[async_trait]
impl RetryStrategy for ClientRetryStrategy {
    async fn retry_with_cancellation<T, E, P, F, Fut>(
        &self,
        policy: &P,
        operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        T: Send,
        E: Send,
        P: RetryPolicy<T, E> + ?Sized,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let (result, _) = self.retry_with_metrics("unnamed", policy, operation, cancel).await;
        result
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for strategy options and runtime selection.
    use super::*;

    #[test]
    fn test_options_bounds() {
        assert!(StandardRetryStrategyOptions::default().validate().is_ok());
        assert!(StandardRetryStrategyOptions::builder().max_attempts(1).build().is_ok());
        assert!(StandardRetryStrategyOptions::builder().max_attempts(100).build().is_ok());
        assert!(StandardRetryStrategyOptions::builder().max_attempts(0).build().is_err());
        assert!(StandardRetryStrategyOptions::builder().max_attempts(101).build().is_err());
    }

    /// Validates strategy selection by mode.
    ///
    /// Assertions:
    /// - Each mode builds the matching variant.
    /// - Unknown modes are rejected.
    #[test]
    fn test_client_strategy_from_mode() {
        let standard: ClientRetryStrategy = "standard".parse().unwrap();
        let adaptive: ClientRetryStrategy = "adaptive".parse().unwrap();

        assert_eq!(standard.mode(), RetryMode::Standard);
        assert_eq!(adaptive.mode(), RetryMode::Adaptive);
        assert_eq!(adaptive.token_bucket().available(), 500);
        assert!("legacy".parse::<ClientRetryStrategy>().is_err());
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = RetryConfig { max_attempts: 0, ..RetryConfig::default() };
        assert!(ClientRetryStrategy::from_config(&config).is_err());
    }
}
