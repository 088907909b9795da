// Defaults shared by the retry components
use std::time::Duration;

/// Default maximum number of attempts (first attempt included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Minimum allowed max_attempts value
pub const MIN_MAX_ATTEMPTS: u32 = 1;

/// Maximum allowed max_attempts value
pub const MAX_MAX_ATTEMPTS: u32 = 100;

/// Default delay before the first retry
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(10);

/// Default multiplier applied to the delay for every further retry
pub const DEFAULT_SCALE_FACTOR: f64 = 1.5;

/// Default jitter fraction (0.0 = no jitter, 1.0 = full jitter)
pub const DEFAULT_JITTER: f64 = 1.0;

/// Default maximum delay cap
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(20);

/// Token bucket: default maximum capacity
pub const DEFAULT_MAX_CAPACITY: u32 = 500;

/// Token bucket: default cost of retrying a throttling, server-side or
/// client-side failure
pub const DEFAULT_RETRY_COST: u32 = 5;

/// Token bucket: default cost of retrying a transient (timeout-like) failure
pub const DEFAULT_TIMEOUT_RETRY_COST: u32 = 5;

/// Token bucket: default cost of the first attempt
pub const DEFAULT_INITIAL_TRY_COST: u32 = 0;

/// Token bucket: default capacity returned when a first attempt succeeds
pub const DEFAULT_INITIAL_TRY_SUCCESS_INCREMENT: u32 = 0;

/// Token bucket: default refill rate (disabled)
pub const DEFAULT_REFILL_UNITS_PER_SECOND: f64 = 0.0;

/// Rate limiter: how much to scale back after a throttling response
pub const DEFAULT_BETA: f64 = 0.7;

/// Rate limiter: how aggressively the rate climbs back after a throttle
pub const DEFAULT_SCALE_CONSTANT: f64 = 0.4;

/// Rate limiter: EWMA weight given to the newest throughput sample
pub const DEFAULT_SMOOTHING: f64 = 0.8;

/// Rate limiter: floor for the computed refill rate
pub const DEFAULT_MIN_FILL_RATE: f64 = 0.5;

/// Rate limiter: width of a throughput measurement slot
pub const DEFAULT_MEASUREMENT_BUCKET: Duration = Duration::from_millis(500);
