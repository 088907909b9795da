//! Retry strategies and client-side rate limiting for generated service
//! clients.
//!
//! After a failed call the strategy decides whether to retry, how long to
//! wait, and how much throughput the client should allow itself afterwards.
//!
//! # Components
//!
//! - **[`backoff`]**: jittered exponential delay calculator
//! - **[`token_bucket`]**: shared retry quota with per-kind retry costs
//! - **[`rate_limit`]**: cubic rate calculator, throughput measurer and the
//!   adaptive rate limiter that composes them
//! - **[`policy`]**: classification of call outcomes into retry directives
//! - **[`strategy`]**: the attempt loop (standard and adaptive variants)
//! - **[`config`]**: construction-time configuration, loadable from TOML
//!
//! # Example
//!
//! ```rust
//! use clientrt_retry::{
//!     policy::{RetryDirective, RetryErrorType},
//!     RetryStrategy, StandardRetryStrategy,
//! };
//!
//! # async fn example() -> Result<(), clientrt_retry::RetryError<std::io::Error>> {
//! let strategy = StandardRetryStrategy::with_defaults();
//! let policy = |result: &Result<u16, std::io::Error>| match result {
//!     Ok(_) => RetryDirective::TerminateAndSucceed,
//!     Err(_) => RetryDirective::RetryError(RetryErrorType::Transient),
//! };
//!
//! let status = strategy.retry(&policy, || async { Ok::<_, std::io::Error>(200) }).await?;
//! assert_eq!(status, 200);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod backoff;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod rate_limit;
pub mod strategy;
pub mod telemetry;
pub mod time;
pub mod token_bucket;
pub mod utils;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use backoff::{ExponentialBackoffWithJitter, ExponentialBackoffWithJitterOptions};
pub use config::{RetryConfig, RetryMode};
pub use error::{
    ConfigError, ErrorClassification, ErrorSeverity, ExhaustionKind, RetryError, TokenBucketError,
};
pub use metrics::RetryMetrics;
pub use policy::{RetryDirective, RetryErrorType, RetryPolicy};
pub use rate_limit::{
    AdaptiveRateLimiter, AdaptiveRateLimiterConfig, AdaptiveRateMeasurer, CubicRateCalculator,
};
pub use strategy::{
    AdaptiveRetryStrategy, ClientRetryStrategy, RetryStrategy, StandardRetryStrategy,
    StandardRetryStrategyOptions,
};
pub use time::{Clock, MockClock, SystemClock};
pub use token_bucket::{RetryToken, StandardRetryTokenBucket, StandardRetryTokenBucketOptions};
pub use utils::serde::duration_millis;
