// Adaptive retry strategy: standard loop plus client-side rate adaptation
use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::{RetryOutcome, RetryStrategy, StandardRetryStrategy};
use crate::error::RetryError;
use crate::metrics::RetryMetrics;
use crate::policy::RetryPolicy;
use crate::rate_limit::AdaptiveRateLimiter;
use crate::telemetry::RetryTracer;
use crate::time::{Clock, SystemClock};
use crate::token_bucket::StandardRetryTokenBucket;

/// Standard retries plus an adaptive refill rate for the token bucket
///
/// Every success and every scheduled retry is reported to the rate limiter.
/// Once a throttling error has enabled the limiter, its refill rate is
/// written into the token bucket after each update.
#[derive(Debug)]
pub struct AdaptiveRetryStrategy<C: Clock = SystemClock> {
    standard: StandardRetryStrategy<C>,
    limiter: AdaptiveRateLimiter<C>,
}

impl<C: Clock> Clone for AdaptiveRetryStrategy<C> {
    fn clone(&self) -> Self {
        Self { standard: self.standard.clone(), limiter: self.limiter.clone() }
    }
}

impl AdaptiveRetryStrategy<SystemClock> {
    /// Default options, a fresh bucket and a default limiter
    pub fn with_defaults() -> Self {
        Self::new(StandardRetryStrategy::with_defaults(), AdaptiveRateLimiter::default())
    }
}

impl<C: Clock> AdaptiveRetryStrategy<C> {
    /// Combine a standard strategy with a rate limiter
    pub fn new(standard: StandardRetryStrategy<C>, limiter: AdaptiveRateLimiter<C>) -> Self {
        Self { standard, limiter }
    }

    /// The wrapped standard strategy
    pub fn standard(&self) -> &StandardRetryStrategy<C> {
        &self.standard
    }

    /// The token bucket shared by every call
    pub fn token_bucket(&self) -> &StandardRetryTokenBucket<C> {
        self.standard.token_bucket()
    }

    /// The rate limiter shared by every call
    pub fn rate_limiter(&self) -> &AdaptiveRateLimiter<C> {
        &self.limiter
    }

    /// Retry `operation` and report what happened
    #[instrument(
        name = "retry",
        skip_all,
        fields(
            operation = operation_name,
            max_attempts = self.standard.options().max_attempts,
            mode = "adaptive"
        )
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
        let max_attempts = self.standard.options().max_attempts;
        let mut span = RetryTracer::new().start_retry_span(operation_name, max_attempts);
        let mut metrics = RetryMetrics::new();
        let result = self
            .standard
            .run(Some(&self.limiter), policy, operation, cancel, &mut span, &mut metrics)
            .await;
        (result, metrics)
    }
}

#[async_trait]
impl<C: Clock> RetryStrategy for AdaptiveRetryStrategy<C> {
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
