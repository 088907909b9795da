//! Adaptive client-side rate limiting
//!
//! Three layers, leaf first:
//!
//! - [`CubicRateCalculator`]: TCP-Cubic style curve. Multiplicative decrease
//!   on throttling, cubic climb back toward the last known maximum.
//! - [`AdaptiveRateMeasurer`]: smoothed requests-per-second over fixed time
//!   slots.
//! - [`AdaptiveRateLimiter`]: combines the two into a refill rate for the
//!   retry token bucket. It never touches the bucket itself; the strategy
//!   pushes the rate.

pub mod cubic;
pub mod limiter;
pub mod measurer;

pub use cubic::CubicRateCalculator;
pub use limiter::{AdaptiveRateLimiter, AdaptiveRateLimiterConfig, AdaptiveRateLimiterConfigBuilder};
pub use measurer::AdaptiveRateMeasurer;
