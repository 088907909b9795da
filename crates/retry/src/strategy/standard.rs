// Standard retry strategy: token bucket + jittered exponential backoff
use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::{RetryOutcome, RetryStrategy, StandardRetryStrategyOptions};
use crate::backoff::ExponentialBackoffWithJitter;
use crate::error::{ExhaustionKind, RetryError};
use crate::metrics::RetryMetrics;
use crate::policy::{RetryDirective, RetryErrorType, RetryPolicy};
use crate::rate_limit::AdaptiveRateLimiter;
use crate::telemetry::{RetrySpan, RetryTracer};
use crate::time::{Clock, SystemClock};
use crate::token_bucket::StandardRetryTokenBucket;

/// Retries failed calls while the shared token bucket can pay for them
///
/// Clones share the token bucket, so one strategy per client bounds the
/// retry load of every call made through it.
#[derive(Debug)]
pub struct StandardRetryStrategy<C: Clock = SystemClock> {
    options: StandardRetryStrategyOptions,
    bucket: StandardRetryTokenBucket<C>,
    backoff: ExponentialBackoffWithJitter,
}

impl<C: Clock> Clone for StandardRetryStrategy<C> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            bucket: self.bucket.clone(),
            backoff: self.backoff.clone(),
        }
    }
}

impl StandardRetryStrategy<SystemClock> {
    /// Default options, a fresh 500-unit bucket and default backoff
    pub fn with_defaults() -> Self {
        Self::new(
            StandardRetryStrategyOptions::default(),
            StandardRetryTokenBucket::with_defaults(),
            ExponentialBackoffWithJitter::default(),
        )
    }
}

impl<C: Clock> StandardRetryStrategy<C> {
    /// Create a strategy from its parts
    pub fn new(
        options: StandardRetryStrategyOptions,
        bucket: StandardRetryTokenBucket<C>,
        backoff: ExponentialBackoffWithJitter,
    ) -> Self {
        Self { options, bucket, backoff }
    }

    /// Options this strategy was built with
    pub fn options(&self) -> &StandardRetryStrategyOptions {
        &self.options
    }

    /// The token bucket shared by every call
    pub fn token_bucket(&self) -> &StandardRetryTokenBucket<C> {
        &self.bucket
    }

    /// Backoff calculator used between attempts
    pub fn backoff(&self) -> &ExponentialBackoffWithJitter {
        &self.backoff
    }

    /// Retry `operation` and report what happened
    #[instrument(
        name = "retry",
        skip_all,
        fields(operation = operation_name, max_attempts = self.options.max_attempts, mode = "standard")
    )]
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
        let mut span = RetryTracer::new().start_retry_span(operation_name, self.options.max_attempts);
        let mut metrics = RetryMetrics::new();
        let result = self.run(None, policy, operation, cancel, &mut span, &mut metrics).await;
        (result, metrics)
    }

    /// The attempt loop; `limiter` is set by the adaptive variant
    pub(super) async fn run<T, E, P, F, Fut>(
        &self,
        limiter: Option<&AdaptiveRateLimiter<C>>,
        policy: &P,
        mut operation: F,
        cancel: &CancellationToken,
        span: &mut RetrySpan,
        metrics: &mut RetryMetrics,
    ) -> Result<T, RetryError<E>>
    where
        P: RetryPolicy<T, E> + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Ok(mut token) = self.bucket.acquire_token() else {
            return Err(exhausted(ExhaustionKind::InsufficientCapacity, 0, None, span, metrics));
        };

        let mut attempt = 1;
        loop {
            metrics.attempts = attempt;
            span.record_attempt(attempt);

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    token.cancel();
                    metrics.cancelled = true;
                    span.record_cancelled(attempt, false);
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                result = operation() => result,
            };

            let kind = match policy.evaluate(&result) {
                RetryDirective::TerminateAndSucceed => {
                    token.notify_success();
                    self.update_limiter(limiter, None);
                    metrics.succeeded = true;
                    span.record_success(attempt, metrics.total_delay);
                    return result.map_err(RetryError::Operation);
                }
                RetryDirective::TerminateAndFail => {
                    token.notify_failure();
                    span.record_failure(attempt);
                    return result.map_err(RetryError::Operation);
                }
                RetryDirective::RetryError(kind) => kind,
            };

            if attempt >= self.options.max_attempts {
                token.notify_failure();
                return Err(exhausted(
                    ExhaustionKind::MaxAttemptsExceeded,
                    attempt,
                    result.err(),
                    span,
                    metrics,
                ));
            }

            let next = match token.schedule_retry(kind) {
                Ok(next) => next,
                Err(_) => {
                    return Err(exhausted(
                        ExhaustionKind::InsufficientCapacity,
                        attempt,
                        result.err(),
                        span,
                        metrics,
                    ));
                }
            };

            self.update_limiter(limiter, Some(kind));
            let delay = self.backoff.backoff(attempt);
            metrics.record_delay(delay);
            span.record_retry(attempt, kind, delay, self.bucket.available());

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    next.cancel();
                    metrics.cancelled = true;
                    span.record_cancelled(attempt, true);
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                () = tokio::time::sleep(delay) => {}
            }

            token = next;
            attempt += 1;
        }
    }

    fn update_limiter(
        &self,
        limiter: Option<&AdaptiveRateLimiter<C>>,
        error: Option<RetryErrorType>,
    ) {
        if let Some(limiter) = limiter {
            limiter.update_and_apply(error, &self.bucket);
        }
    }
}

fn exhausted<E>(
    kind: ExhaustionKind,
    attempts: u32,
    last_error: Option<E>,
    span: &mut RetrySpan,
    metrics: &mut RetryMetrics,
) -> RetryError<E> {
    metrics.exhaustion = Some(kind);
    span.record_exhausted(kind, attempts);
    RetryError::exhausted(kind, attempts, last_error)
}

#[async_trait]
impl<C: Clock> RetryStrategy for StandardRetryStrategy<C> {
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
