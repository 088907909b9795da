// Shared retry quota: permission to retry, paid for in capacity units
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{
    DEFAULT_INITIAL_TRY_COST, DEFAULT_INITIAL_TRY_SUCCESS_INCREMENT, DEFAULT_MAX_CAPACITY,
    DEFAULT_REFILL_UNITS_PER_SECOND, DEFAULT_RETRY_COST, DEFAULT_TIMEOUT_RETRY_COST,
};
use crate::error::{ConfigError, TokenBucketError};
use crate::policy::RetryErrorType;
use crate::time::{Clock, SystemClock};

/// Options for [`StandardRetryTokenBucket`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardRetryTokenBucketOptions {
    /// Upper bound on capacity
    pub max_capacity: u32,
    /// Starting capacity; `None` starts full
    pub initial_capacity: Option<u32>,
    /// Lazy refill rate; `0.0` disables refill
    pub refill_units_per_second: f64,
    /// Cost of retrying a throttling, server-side or client-side failure
    pub retry_cost: u32,
    /// Cost of retrying a transient (timeout-like) failure
    pub timeout_retry_cost: u32,
    /// Cost charged by [`StandardRetryTokenBucket::acquire_token`]
    pub initial_try_cost: u32,
    /// Capacity returned when a first attempt succeeds
    pub initial_try_success_increment: u32,
}

impl Default for StandardRetryTokenBucketOptions {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            initial_capacity: None,
            refill_units_per_second: DEFAULT_REFILL_UNITS_PER_SECOND,
            retry_cost: DEFAULT_RETRY_COST,
            timeout_retry_cost: DEFAULT_TIMEOUT_RETRY_COST,
            initial_try_cost: DEFAULT_INITIAL_TRY_COST,
            initial_try_success_increment: DEFAULT_INITIAL_TRY_SUCCESS_INCREMENT,
        }
    }
}

impl StandardRetryTokenBucketOptions {
    /// Start a builder from the defaults
    pub fn builder() -> StandardRetryTokenBucketOptionsBuilder {
        StandardRetryTokenBucketOptionsBuilder::default()
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_capacity == 0 {
            return Err(ConfigError::invalid("max_capacity", "must be greater than 0"));
        }
        if let Some(initial) = self.initial_capacity {
            if initial > self.max_capacity {
                return Err(ConfigError::invalid(
                    "initial_capacity",
                    format!("{initial} exceeds max_capacity {}", self.max_capacity),
                ));
            }
        }
        if !self.refill_units_per_second.is_finite() || self.refill_units_per_second < 0.0 {
            return Err(ConfigError::invalid(
                "refill_units_per_second",
                "must be a non-negative finite number",
            ));
        }
        Ok(())
    }

    /// Cost of retrying a failure of the given kind
    pub fn cost_for(&self, kind: RetryErrorType) -> u32 {
        match kind {
            RetryErrorType::Transient => self.timeout_retry_cost,
            RetryErrorType::Throttling
            | RetryErrorType::ServerSide
            | RetryErrorType::ClientSide => self.retry_cost,
        }
    }
}

/// Builder for [`StandardRetryTokenBucketOptions`]
#[derive(Debug, Default)]
pub struct StandardRetryTokenBucketOptionsBuilder {
    options: StandardRetryTokenBucketOptions,
}

impl StandardRetryTokenBucketOptionsBuilder {
    /// Set the largest capacity the bucket holds
    pub fn max_capacity(mut self, capacity: u32) -> Self {
        self.options.max_capacity = capacity;
        self
    }

    /// Set the starting capacity
    pub fn initial_capacity(mut self, capacity: u32) -> Self {
        self.options.initial_capacity = Some(capacity);
        self
    }

    /// Set the time-based refill rate
    pub fn refill_units_per_second(mut self, rate: f64) -> Self {
        self.options.refill_units_per_second = rate;
        self
    }

    /// Set the cost of retrying any non-transient failure
    pub fn retry_cost(mut self, cost: u32) -> Self {
        self.options.retry_cost = cost;
        self
    }

    /// Set the cost of retrying a transient failure
    pub fn timeout_retry_cost(mut self, cost: u32) -> Self {
        self.options.timeout_retry_cost = cost;
        self
    }

    /// Set the cost of a first attempt
    pub fn initial_try_cost(mut self, cost: u32) -> Self {
        self.options.initial_try_cost = cost;
        self
    }

    /// Set the credit returned when a first attempt succeeds
    pub fn initial_try_success_increment(mut self, increment: u32) -> Self {
        self.options.initial_try_success_increment = increment;
        self
    }

    /// Validate and return the options
    pub fn build(self) -> Result<StandardRetryTokenBucketOptions, ConfigError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

#[derive(Debug)]
struct BucketState {
    capacity: u32,
    /// Refill accumulated below one whole unit
    fractional: f64,
    last_refill: Instant,
    refill_units_per_second: f64,
}

#[derive(Debug)]
struct BucketInner<C: Clock> {
    options: StandardRetryTokenBucketOptions,
    state: Mutex<BucketState>,
    clock: C,
}

impl<C: Clock> BucketInner<C> {
    /// Credit elapsed-time refill. Caller holds the lock.
    fn refill(&self, state: &mut BucketState) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;

        if state.refill_units_per_second <= 0.0 || elapsed <= 0.0 {
            return;
        }

        let max = self.options.max_capacity;
        if state.capacity >= max {
            state.fractional = 0.0;
            return;
        }

        let total = state.fractional + elapsed * state.refill_units_per_second;
        let whole = total.floor();
        let headroom = f64::from(max - state.capacity);
        if whole >= headroom {
            state.capacity = max;
            state.fractional = 0.0;
        } else {
            // whole < headroom <= u32::MAX, so the cast is exact
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let added = whole as u32;
            state.capacity += added;
            state.fractional = total - whole;
            if added > 0 {
                debug!(added, capacity = state.capacity, "retry token bucket refilled");
            }
        }
    }

    fn take(&self, cost: u32) -> Result<u32, TokenBucketError> {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.capacity < cost {
            warn!(
                requested = cost,
                available = state.capacity,
                "insufficient retry capacity"
            );
            return Err(TokenBucketError::InsufficientCapacity {
                requested: cost,
                available: state.capacity,
            });
        }
        state.capacity -= cost;
        Ok(state.capacity)
    }

    fn give(&self, amount: u32) {
        if amount == 0 {
            return;
        }
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.capacity = state.capacity.saturating_add(amount).min(self.options.max_capacity);
        debug!(refunded = amount, capacity = state.capacity, "retry capacity returned");
    }
}

/// Capacity-limited retry quota shared by every call of one client
///
/// Clones share the same capacity. The first attempt of a call costs
/// `initial_try_cost` (free by default); every retry costs `retry_cost` or
/// `timeout_retry_cost` depending on the failure kind; a retry that ends in
/// success refunds what its token paid.
///
/// # Examples
///
/// ```
/// use clientrt_retry::{policy::RetryErrorType, StandardRetryTokenBucket};
///
/// let bucket = StandardRetryTokenBucket::with_defaults();
/// let token = bucket.acquire_token().unwrap();
/// let retry = token.schedule_retry(RetryErrorType::ServerSide).unwrap();
/// assert_eq!(bucket.available(), 495);
///
/// retry.notify_success();
/// assert_eq!(bucket.available(), 500);
/// ```
#[derive(Debug)]
pub struct StandardRetryTokenBucket<C: Clock = SystemClock> {
    inner: Arc<BucketInner<C>>,
}

impl<C: Clock> Clone for StandardRetryTokenBucket<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl StandardRetryTokenBucket<SystemClock> {
    /// Create a bucket reading the system clock
    pub fn new(options: StandardRetryTokenBucketOptions) -> Self {
        Self::with_clock(options, SystemClock)
    }

    /// Default options on the system clock
    pub fn with_defaults() -> Self {
        Self::new(StandardRetryTokenBucketOptions::default())
    }
}

impl<C: Clock> StandardRetryTokenBucket<C> {
    /// Create a bucket with a custom clock (for testing)
    pub fn with_clock(options: StandardRetryTokenBucketOptions, clock: C) -> Self {
        let capacity =
            options.initial_capacity.unwrap_or(options.max_capacity).min(options.max_capacity);
        let refill = sanitize_rate(options.refill_units_per_second);
        let state = BucketState {
            capacity,
            fractional: 0.0,
            last_refill: clock.now(),
            refill_units_per_second: refill,
        };
        Self { inner: Arc::new(BucketInner { options, state: Mutex::new(state), clock }) }
    }

    /// Obtain a token for the first attempt of a call
    ///
    /// Charges `initial_try_cost`, which is zero unless configured.
    pub fn acquire_token(&self) -> Result<RetryToken<C>, TokenBucketError> {
        let cost = self.inner.options.initial_try_cost;
        if cost > 0 {
            self.inner.take(cost)?;
        }
        Ok(RetryToken { bucket: self.clone(), paid: cost, is_retry: false })
    }

    /// Current capacity, after crediting any pending refill
    pub fn available(&self) -> u32 {
        let mut state = self.inner.state.lock();
        self.inner.refill(&mut state);
        state.capacity
    }

    /// Largest capacity the bucket holds
    pub fn max_capacity(&self) -> u32 {
        self.inner.options.max_capacity
    }

    /// Options this bucket was built with
    pub fn options(&self) -> &StandardRetryTokenBucketOptions {
        &self.inner.options
    }

    /// Current time-based refill rate
    pub fn refill_units_per_second(&self) -> f64 {
        self.inner.state.lock().refill_units_per_second
    }

    /// Change the refill rate
    ///
    /// Time elapsed so far is credited at the old rate first. Negative or
    /// non-finite rates are treated as zero.
    pub fn set_refill_units_per_second(&self, rate: f64) {
        let mut state = self.inner.state.lock();
        self.inner.refill(&mut state);
        state.refill_units_per_second = sanitize_rate(rate);
    }

    /// Restore the starting capacity and drop accumulated refill
    pub fn reset(&self) {
        let options = &self.inner.options;
        let mut state = self.inner.state.lock();
        state.capacity =
            options.initial_capacity.unwrap_or(options.max_capacity).min(options.max_capacity);
        state.fractional = 0.0;
        state.last_refill = self.inner.clock.now();
    }
}

fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        0.0
    }
}

/// Permission for one attempt of a call
///
/// Every method consumes the token, so each token is resolved exactly once:
/// by success, by terminal failure, or by being exchanged for the token of
/// the next attempt.
#[must_use = "a retry token must be resolved with notify_success, notify_failure or schedule_retry"]
#[derive(Debug)]
pub struct RetryToken<C: Clock = SystemClock> {
    bucket: StandardRetryTokenBucket<C>,
    paid: u32,
    is_retry: bool,
}

impl<C: Clock> RetryToken<C> {
    /// Capacity this token paid for
    pub fn cost(&self) -> u32 {
        self.paid
    }

    /// Whether this token was obtained through [`Self::schedule_retry`]
    pub fn is_retry(&self) -> bool {
        self.is_retry
    }

    /// The attempt succeeded
    ///
    /// A retry token refunds what it paid; a first-attempt token returns
    /// `initial_try_success_increment`.
    pub fn notify_success(self) {
        let refund = if self.is_retry {
            self.paid
        } else {
            self.bucket.inner.options.initial_try_success_increment
        };
        self.bucket.inner.give(refund);
    }

    /// The attempt failed terminally; nothing is returned to the bucket
    pub fn notify_failure(self) {
        let mut state = self.bucket.inner.state.lock();
        self.bucket.inner.refill(&mut state);
    }

    /// Pay for another attempt after a failure of the given kind
    ///
    /// Fails with [`TokenBucketError::InsufficientCapacity`] when the bucket
    /// cannot cover the cost; capacity is left untouched in that case.
    pub fn schedule_retry(self, kind: RetryErrorType) -> Result<RetryToken<C>, TokenBucketError> {
        let cost = self.bucket.inner.options.cost_for(kind);
        let remaining = self.bucket.inner.take(cost)?;
        debug!(?kind, cost, remaining, "retry capacity charged");
        Ok(RetryToken { bucket: self.bucket, paid: cost, is_retry: true })
    }

    /// Abandon the attempt this token paid for, returning the full cost
    pub fn cancel(self) {
        if self.is_retry {
            self.bucket.inner.give(self.paid);
        }
    }
}
