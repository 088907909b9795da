//! YAML conformance fixtures
//!
//! Two shapes of test vector live under `tests/fixtures/`:
//!
//! - [`StandardRetryFixture`]: a `given` block of strategy parameters and
//!   the scripted `responses` of one call, each with the expected outcome,
//!   remaining retry quota and backoff delay.
//! - [`RateFixture`]: an optional `given` cubic state and timestamped
//!   `cases` of successes and throttles with the expected rates.
//!
//! Runners replay a fixture against the real components and return what
//! they observed; tests compare that with the expectations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backoff::{ExponentialBackoffWithJitter, ExponentialBackoffWithJitterOptions};
use crate::error::{ExhaustionKind, RetryError};
use crate::policy::{RetryDirective, RetryErrorType};
use crate::rate_limit::{AdaptiveRateLimiter, AdaptiveRateLimiterConfig, CubicRateCalculator};
use crate::strategy::{StandardRetryStrategy, StandardRetryStrategyOptions};
use crate::time::MockClock;
use crate::token_bucket::{StandardRetryTokenBucket, StandardRetryTokenBucketOptions};

/// Errors raised while loading a fixture
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fixture {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Directory holding this crate's fixture files
pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

/// Load a YAML fixture file
pub fn load_fixture<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, FixtureError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|source| FixtureError::Io { path: path.to_path_buf(), source })?;
    serde_yaml::from_str(&content)
        .map_err(|source| FixtureError::Yaml { path: path.to_path_buf(), source })
}

/// Parameters of a standard-strategy fixture
///
/// Times are in seconds: a retry after the n-th failure waits
/// `min(exponential_base * exponential_power^(n-1), max_backoff_time)`.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardRetryGiven {
    pub max_attempts: u32,
    pub initial_retry_tokens: u32,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,
    pub exponential_base: f64,
    pub exponential_power: f64,
    pub max_backoff_time: f64,
}

fn default_max_capacity() -> u32 {
    crate::constants::DEFAULT_MAX_CAPACITY
}

/// Outcome of one response in a standard-strategy fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The strategy scheduled another attempt
    RetryRequest,
    Success,
    /// The policy rejected the response
    Fail,
    MaxAttemptsExceeded,
    RetryQuotaExceeded,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub status_code: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Expected {
    pub outcome: Outcome,
    pub retry_quota: u32,
    /// Backoff in seconds; present only for `retry_request`
    #[serde(default)]
    pub delay: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseStep {
    pub response: Response,
    pub expected: Expected,
}

/// What the runner saw for one response
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedStep {
    pub outcome: Outcome,
    pub retry_quota: u32,
    pub delay: Option<f64>,
}

/// One scripted call against the standard strategy
#[derive(Debug, Clone, Deserialize)]
pub struct StandardRetryFixture {
    pub name: String,
    pub given: StandardRetryGiven,
    pub responses: Vec<ResponseStep>,
}

/// Maps status codes the way the fixtures expect: 2xx succeeds, 429
/// throttles, 5xx is a server-side error and anything else fails.
pub fn classify_status(result: &Result<u16, u16>) -> RetryDirective {
    let status = match result {
        Ok(status) | Err(status) => *status,
    };
    match status {
        200..=299 => RetryDirective::TerminateAndSucceed,
        429 => RetryDirective::RetryError(RetryErrorType::Throttling),
        500..=599 => RetryDirective::RetryError(RetryErrorType::ServerSide),
        _ => RetryDirective::TerminateAndFail,
    }
}

impl StandardRetryFixture {
    /// Expected observations, one per response
    pub fn expected(&self) -> Vec<ObservedStep> {
        self.responses
            .iter()
            .map(|step| ObservedStep {
                outcome: step.expected.outcome,
                retry_quota: step.expected.retry_quota,
                delay: step.expected.delay,
            })
            .collect()
    }

    fn strategy(&self) -> StandardRetryStrategy<MockClock> {
        let given = &self.given;
        let bucket = StandardRetryTokenBucketOptions {
            max_capacity: given.max_capacity.max(given.initial_retry_tokens).max(1),
            initial_capacity: Some(given.initial_retry_tokens),
            ..StandardRetryTokenBucketOptions::default()
        };
        let backoff = ExponentialBackoffWithJitterOptions {
            initial_delay: Duration::from_secs_f64(given.exponential_base),
            scale_factor: given.exponential_power,
            jitter: 0.0,
            max_backoff: Duration::from_secs_f64(given.max_backoff_time),
        };
        StandardRetryStrategy::new(
            StandardRetryStrategyOptions { max_attempts: given.max_attempts },
            StandardRetryTokenBucket::with_clock(bucket, MockClock::new()),
            ExponentialBackoffWithJitter::new(backoff),
        )
    }

    /// Replay the responses and report one observation per attempt made
    ///
    /// Run on a paused tokio runtime so backoff sleeps complete instantly.
    pub async fn run(&self) -> Vec<ObservedStep> {
        let strategy = self.strategy();
        let statuses: Vec<u16> = self.responses.iter().map(|r| r.response.status_code).collect();
        let quota_before = Arc::new(Mutex::new(Vec::new()));

        let bucket = strategy.token_bucket().clone();
        let seen = Arc::clone(&quota_before);
        let operation = move || {
            let mut seen = seen.lock();
            seen.push(bucket.available());
            let status = statuses.get(seen.len() - 1).or(statuses.last()).copied().unwrap_or(500);
            async move {
                if (200..300).contains(&status) {
                    Ok(status)
                } else {
                    Err(status)
                }
            }
        };

        let (result, metrics) = strategy
            .retry_with_metrics(&self.name, &classify_status, operation, &CancellationToken::new())
            .await;

        let final_outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(RetryError::Operation(_)) => Outcome::Fail,
            Err(e) => match e.exhaustion_kind() {
                Some(ExhaustionKind::InsufficientCapacity) => Outcome::RetryQuotaExceeded,
                _ => Outcome::MaxAttemptsExceeded,
            },
        };

        // Quota right after attempt n is what the next attempt saw
        let quotas = quota_before.lock().clone();
        let attempts = quotas.len();
        (0..attempts)
            .map(|i| {
                if i + 1 < attempts {
                    ObservedStep {
                        outcome: Outcome::RetryRequest,
                        retry_quota: quotas[i + 1],
                        delay: metrics.delays.get(i).map(Duration::as_secs_f64),
                    }
                } else {
                    ObservedStep {
                        outcome: final_outcome,
                        retry_quota: strategy.token_bucket().available(),
                        delay: None,
                    }
                }
            })
            .collect()
    }
}

/// Starting cubic state
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CubicGiven {
    pub last_max_rate: f64,
    pub last_throttle_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateResponse {
    Success,
    Throttle,
}

/// One timestamped outcome with the rates expected after it
#[derive(Debug, Clone, Deserialize)]
pub struct RateCase {
    pub response: RateResponse,
    pub timestamp: f64,
    #[serde(default)]
    pub calculated_rate: Option<f64>,
    #[serde(default)]
    pub measured_tx_rate: Option<f64>,
    #[serde(default)]
    pub new_token_bucket_rate: Option<f64>,
}

/// Rate-calculation test vectors
#[derive(Debug, Clone, Deserialize)]
pub struct RateFixture {
    #[serde(default)]
    pub given: Option<CubicGiven>,
    pub cases: Vec<RateCase>,
}

impl RateFixture {
    /// Rates produced by the cubic calculator alone
    ///
    /// A throttle case reduces the rate returned by the previous case. It
    /// then leaves the calculator anchored at the reduced rate: that rate
    /// becomes `last_max_rate` and the case timestamp becomes
    /// `last_throttle_time`, so later successes climb from there.
    pub fn run_cubic(&self) -> Vec<f64> {
        let mut cubic = CubicRateCalculator::default();
        if let Some(given) = self.given {
            cubic = cubic.with_state(given.last_max_rate, given.last_throttle_time);
        }

        let mut rate = 0.0;
        let mut rates = Vec::with_capacity(self.cases.len());
        for case in &self.cases {
            rate = match case.response {
                RateResponse::Success => cubic.cubic_success(case.timestamp),
                RateResponse::Throttle => {
                    let reduced = cubic.cubic_throttle(rate, case.timestamp);
                    cubic = cubic.with_state(reduced, case.timestamp);
                    reduced
                }
            };
            rates.push(rate);
        }
        rates
    }

    /// `(measured_tx_rate, refill rate)` after each case, through the
    /// adaptive rate limiter
    pub fn run_limiter(&self) -> Vec<(f64, f64)> {
        let limiter =
            AdaptiveRateLimiter::with_clock(AdaptiveRateLimiterConfig::default(), MockClock::new());
        self.cases
            .iter()
            .map(|case| {
                let error = match case.response {
                    RateResponse::Success => None,
                    RateResponse::Throttle => Some(RetryErrorType::Throttling),
                };
                let rate = limiter.update_at(case.timestamp, error);
                (limiter.measured_tx_rate(), rate)
            })
            .collect()
    }
}
