// Adaptive rate limiter: cubic calculator + rate measurer
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AdaptiveRateMeasurer, CubicRateCalculator};
use crate::constants::{
    DEFAULT_BETA, DEFAULT_MEASUREMENT_BUCKET, DEFAULT_MIN_FILL_RATE, DEFAULT_SCALE_CONSTANT,
    DEFAULT_SMOOTHING,
};
use crate::error::ConfigError;
use crate::policy::RetryErrorType;
use crate::time::{Clock, SystemClock};
use crate::token_bucket::StandardRetryTokenBucket;
use crate::utils::serde::duration_millis;

/// Tuning constants for [`AdaptiveRateLimiter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveRateLimiterConfig {
    /// Multiplicative decrease applied on throttling (β)
    pub beta: f64,
    /// Cubic scale constant (C)
    pub scale_constant: f64,
    /// Weight of the newest throughput sample
    pub smoothing: f64,
    /// Floor for the computed refill rate
    pub min_fill_rate: f64,
    /// Width of a throughput measurement slot
    #[serde(with = "duration_millis")]
    pub measurement_bucket: Duration,
}

impl Default for AdaptiveRateLimiterConfig {
    fn default() -> Self {
        Self {
            beta: DEFAULT_BETA,
            scale_constant: DEFAULT_SCALE_CONSTANT,
            smoothing: DEFAULT_SMOOTHING,
            min_fill_rate: DEFAULT_MIN_FILL_RATE,
            measurement_bucket: DEFAULT_MEASUREMENT_BUCKET,
        }
    }
}

impl AdaptiveRateLimiterConfig {
    /// Start a builder from the defaults
    pub fn builder() -> AdaptiveRateLimiterConfigBuilder {
        AdaptiveRateLimiterConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.beta > 0.0 && self.beta < 1.0) {
            return Err(ConfigError::invalid("beta", "must be within (0, 1)"));
        }
        if !self.scale_constant.is_finite() || self.scale_constant <= 0.0 {
            return Err(ConfigError::invalid("scale_constant", "must be a positive finite number"));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(ConfigError::invalid("smoothing", "must be within [0, 1]"));
        }
        if !self.min_fill_rate.is_finite() || self.min_fill_rate < 0.0 {
            return Err(ConfigError::invalid(
                "min_fill_rate",
                "must be a non-negative finite number",
            ));
        }
        if self.measurement_bucket.is_zero() {
            return Err(ConfigError::invalid("measurement_bucket", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Builder for [`AdaptiveRateLimiterConfig`]
#[derive(Debug, Default)]
pub struct AdaptiveRateLimiterConfigBuilder {
    config: AdaptiveRateLimiterConfig,
}

impl AdaptiveRateLimiterConfigBuilder {
    /// Set the multiplicative decrease applied on throttle
    pub fn beta(mut self, beta: f64) -> Self {
        self.config.beta = beta;
        self
    }

    /// Set the cubic scale constant `C`
    pub fn scale_constant(mut self, scale_constant: f64) -> Self {
        self.config.scale_constant = scale_constant;
        self
    }

    /// Set the weight of the newest rate sample
    pub fn smoothing(mut self, smoothing: f64) -> Self {
        self.config.smoothing = smoothing;
        self
    }

    /// Set the lowest refill rate ever returned
    pub fn min_fill_rate(mut self, rate: f64) -> Self {
        self.config.min_fill_rate = rate;
        self
    }

    /// Set the width of one measurement slot
    pub fn measurement_bucket(mut self, width: Duration) -> Self {
        self.config.measurement_bucket = width;
        self
    }

    /// Validate and return the config
    pub fn build(self) -> Result<AdaptiveRateLimiterConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[derive(Debug)]
struct LimiterState {
    measurer: AdaptiveRateMeasurer,
    cubic: CubicRateCalculator,
    fill_rate: f64,
    enabled: bool,
}

impl LimiterState {
    fn new(config: &AdaptiveRateLimiterConfig) -> Self {
        Self {
            measurer: AdaptiveRateMeasurer::new(config.smoothing, config.measurement_bucket),
            cubic: CubicRateCalculator::new(config.beta, config.scale_constant),
            fill_rate: config.min_fill_rate,
            enabled: false,
        }
    }
}

#[derive(Debug)]
struct LimiterInner<C: Clock> {
    config: AdaptiveRateLimiterConfig,
    state: Mutex<LimiterState>,
    origin: Instant,
    clock: C,
}

/// Computes the refill rate a client should allow itself
///
/// Every completed call feeds [`update`](Self::update). Throttling lowers
/// the rate multiplicatively and enables the limiter; any other outcome
/// climbs the cubic curve. The result is capped at twice the measured send
/// rate and floored at `min_fill_rate`.
///
/// Clones share state. Times are seconds since the limiter was created.
#[derive(Debug)]
pub struct AdaptiveRateLimiter<C: Clock = SystemClock> {
    inner: Arc<LimiterInner<C>>,
}

impl<C: Clock> Clone for AdaptiveRateLimiter<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl AdaptiveRateLimiter<SystemClock> {
    /// Create a limiter on the system clock
    pub fn new(config: AdaptiveRateLimiterConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for AdaptiveRateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new(AdaptiveRateLimiterConfig::default())
    }
}

impl<C: Clock> AdaptiveRateLimiter<C> {
    /// Create a limiter with a custom clock (for testing)
    pub fn with_clock(config: AdaptiveRateLimiterConfig, clock: C) -> Self {
        let state = LimiterState::new(&config);
        let origin = clock.now();
        Self { inner: Arc::new(LimiterInner { config, state: Mutex::new(state), origin, clock }) }
    }

    /// Configuration this limiter was built with
    pub fn config(&self) -> &AdaptiveRateLimiterConfig {
        &self.inner.config
    }

    /// Record a call outcome now; `None` is a success
    ///
    /// Returns the new refill rate in units per second.
    pub fn update(&self, error: Option<RetryErrorType>) -> f64 {
        let now = self.inner.clock.seconds_since(self.inner.origin);
        self.update_at(now, error)
    }

    /// Record a call outcome at `now` seconds on the limiter's timeline
    pub fn update_at(&self, now: f64, error: Option<RetryErrorType>) -> f64 {
        let mut state = self.inner.state.lock();
        self.record(&mut state, now, error)
    }

    /// Record a call outcome now and push the new rate into `bucket`
    ///
    /// The bucket is only touched once the limiter is enabled. Both happen
    /// under the limiter lock, so concurrent callers leave the bucket at the
    /// limiter's latest rate. Lock order is limiter, then bucket.
    pub fn update_and_apply<B: Clock>(
        &self,
        error: Option<RetryErrorType>,
        bucket: &StandardRetryTokenBucket<B>,
    ) -> f64 {
        let now = self.inner.clock.seconds_since(self.inner.origin);
        let mut state = self.inner.state.lock();
        let rate = self.record(&mut state, now, error);
        if state.enabled {
            bucket.set_refill_units_per_second(rate);
        }
        rate
    }

    fn record(&self, state: &mut LimiterState, now: f64, error: Option<RetryErrorType>) -> f64 {
        let throttled = error.is_some_and(RetryErrorType::is_throttling);

        let measured = state.measurer.update(now, error.is_some());

        let calculated = if throttled {
            let rate_to_use = if state.enabled { measured.min(state.fill_rate) } else { measured };
            let reduced = state.cubic.cubic_throttle(rate_to_use, now);
            if !state.enabled {
                state.enabled = true;
                info!(rate = rate_to_use, "adaptive rate limiting enabled");
            }
            reduced
        } else {
            state.cubic.cubic_success(now)
        };

        let new_rate = calculated.min(2.0 * measured).max(self.inner.config.min_fill_rate);
        if (new_rate - state.fill_rate).abs() > f64::EPSILON {
            debug!(
                fill_rate = new_rate,
                measured_tx_rate = measured,
                last_max_rate = state.cubic.last_max_rate(),
                throttled,
                "adaptive refill rate updated"
            );
        }
        state.fill_rate = new_rate;
        new_rate
    }

    /// Currently permitted refill rate
    pub fn refill_units_per_second(&self) -> f64 {
        self.inner.state.lock().fill_rate
    }

    /// Smoothed send rate
    pub fn measured_tx_rate(&self) -> f64 {
        self.inner.state.lock().measurer.measured_tx_rate()
    }

    /// Whether a throttling error has been seen
    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    /// Rate recorded by the most recent throttle
    pub fn last_max_rate(&self) -> f64 {
        self.inner.state.lock().cubic.last_max_rate()
    }

    /// Error samples recorded since creation
    pub fn error_samples(&self) -> u64 {
        self.inner.state.lock().measurer.total_errors()
    }

    /// Forget everything learned so far
    pub fn reset(&self) {
        *self.inner.state.lock() = LimiterState::new(&self.inner.config);
    }
}
