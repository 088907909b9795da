//! Jittered exponential backoff
//!
//! `delay(n) = min(max_backoff, initial_delay * scale_factor^(n-1))`, then
//! scaled by a random factor drawn from `[1 - jitter, 1]`. Attempt numbers
//! are 1-based: the first retry waits for `backoff(1)`.
//!
//! A jitter of `0.0` skips the random draw entirely, which keeps delays
//! reproducible for fixture-driven tests.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_INITIAL_DELAY, DEFAULT_JITTER, DEFAULT_MAX_BACKOFF, DEFAULT_SCALE_FACTOR,
};
use crate::error::ConfigError;
use crate::utils::serde::duration_millis;

/// Options for [`ExponentialBackoffWithJitter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExponentialBackoffWithJitterOptions {
    /// Delay before the first retry
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,
    /// Multiplier applied for every further retry
    pub scale_factor: f64,
    /// Fraction of the delay that may be randomly removed, in `[0, 1]`
    pub jitter: f64,
    /// Upper bound on any single delay
    #[serde(with = "duration_millis")]
    pub max_backoff: Duration,
}

impl Default for ExponentialBackoffWithJitterOptions {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            scale_factor: DEFAULT_SCALE_FACTOR,
            jitter: DEFAULT_JITTER,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl ExponentialBackoffWithJitterOptions {
    /// Start a builder from the defaults
    pub fn builder() -> ExponentialBackoffWithJitterOptionsBuilder {
        ExponentialBackoffWithJitterOptionsBuilder::default()
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(ConfigError::invalid("scale_factor", "must be a positive finite number"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::invalid("jitter", "must be within [0, 1]"));
        }
        Ok(())
    }
}

/// Builder for [`ExponentialBackoffWithJitterOptions`]
#[derive(Debug, Default)]
pub struct ExponentialBackoffWithJitterOptionsBuilder {
    options: ExponentialBackoffWithJitterOptions,
}

impl ExponentialBackoffWithJitterOptionsBuilder {
    /// Set the delay before the first retry
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.options.initial_delay = delay;
        self
    }

    /// Set the multiplier applied per further retry
    pub fn scale_factor(mut self, factor: f64) -> Self {
        self.options.scale_factor = factor;
        self
    }

    /// Set the random fraction that may be removed from each delay
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.options.jitter = jitter;
        self
    }

    /// Disable randomness; delays become exactly the exponential series
    pub fn no_jitter(self) -> Self {
        self.jitter(0.0)
    }

    /// Set the upper bound on any single delay
    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.options.max_backoff = max;
        self
    }

    /// Remove the delay cap
    pub fn unbounded(self) -> Self {
        self.max_backoff(Duration::MAX)
    }

    /// Validate and return the options
    pub fn build(self) -> Result<ExponentialBackoffWithJitterOptions, ConfigError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

/// Stateless delay calculator
#[derive(Debug, Clone, Default)]
pub struct ExponentialBackoffWithJitter {
    options: ExponentialBackoffWithJitterOptions,
}

impl ExponentialBackoffWithJitter {
    /// Create a calculator from validated options
    pub fn new(options: ExponentialBackoffWithJitterOptions) -> Self {
        Self { options }
    }

    /// Options this calculator was built with
    pub fn options(&self) -> &ExponentialBackoffWithJitterOptions {
        &self.options
    }

    /// Delay to wait before retry number `attempt`, jitter applied
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_nanos(attempt);
        if self.options.jitter <= 0.0 {
            return self.to_duration(base);
        }

        let factor = rand::thread_rng().gen_range((1.0 - self.options.jitter)..=1.0);
        self.to_duration(base * factor)
    }

    /// Delay for `attempt` before jitter is applied
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.to_duration(self.base_nanos(attempt))
    }

    /// The first `count` delays, attempts `1..=count`
    pub fn series(&self, count: u32) -> Vec<Duration> {
        (1..=count).map(|attempt| self.backoff(attempt)).collect()
    }

    fn base_nanos(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let initial = self.options.initial_delay.as_nanos() as f64;
        let cap = self.options.max_backoff.as_nanos() as f64;
        (initial * self.options.scale_factor.powi(exponent)).min(cap)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn to_duration(&self, nanos: f64) -> Duration {
        // Anything past u64 nanoseconds (~584 years) can only be the cap
        if !nanos.is_finite() || nanos >= u64::MAX as f64 {
            return self.options.max_backoff;
        }
        Duration::from_nanos(nanos.max(0.0).round() as u64).min(self.options.max_backoff)
    }
}
