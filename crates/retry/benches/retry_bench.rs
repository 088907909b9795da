//! Retry primitive benchmarks
//!
//! Covers the per-call hot paths: backoff calculation, token bucket
//! accounting, rate limiter updates and the full strategy loop.
//!
//! Run with: `cargo bench --bench retry_bench -p clientrt-retry`

use std::time::Duration;

use clientrt_retry::policy::AlwaysRetry;
use clientrt_retry::{
    AdaptiveRateLimiter, AdaptiveRateLimiterConfig, CubicRateCalculator,
    ExponentialBackoffWithJitter, ExponentialBackoffWithJitterOptions, MockClock, RetryErrorType,
    RetryStrategy, StandardRetryStrategy, StandardRetryStrategyOptions, StandardRetryTokenBucket,
    StandardRetryTokenBucketOptions,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Builder as RuntimeBuilder;

// ============================================================================
// Backoff Benchmarks
// ============================================================================

fn bench_backoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff");

    let jittered = ExponentialBackoffWithJitter::default();
    let plain = ExponentialBackoffWithJitter::new(
        ExponentialBackoffWithJitterOptions::builder()
            .no_jitter()
            .build()
            .expect("valid backoff options for benchmarks"),
    );

    for attempt in [1_u32, 5, 20] {
        group.bench_with_input(BenchmarkId::new("jittered", attempt), &attempt, |b, &attempt| {
            b.iter(|| black_box(jittered.backoff(black_box(attempt))));
        });
        group.bench_with_input(BenchmarkId::new("no_jitter", attempt), &attempt, |b, &attempt| {
            b.iter(|| black_box(plain.backoff(black_box(attempt))));
        });
    }

    group.finish();
}

// ============================================================================
// Token Bucket Benchmarks
// ============================================================================

fn bench_token_bucket(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_bucket");

    group.bench_function("acquire_success", |b| {
        let bucket = StandardRetryTokenBucket::with_defaults();
        b.iter(|| {
            if let Ok(token) = bucket.acquire_token() {
                token.notify_success();
            }
        });
    });

    group.bench_function("retry_then_success", |b| {
        let bucket = StandardRetryTokenBucket::with_defaults();
        b.iter(|| {
            let retried = bucket
                .acquire_token()
                .and_then(|token| token.schedule_retry(RetryErrorType::ServerSide));
            if let Ok(token) = retried {
                token.notify_success();
            }
        });
    });

    group.bench_function("refill_accounting", |b| {
        let clock = MockClock::new();
        let options = StandardRetryTokenBucketOptions::builder()
            .refill_units_per_second(50.0)
            .build()
            .expect("valid bucket options for benchmarks");
        let bucket = StandardRetryTokenBucket::with_clock(options, clock.clone());
        b.iter(|| {
            clock.advance(Duration::from_millis(3));
            let retried = bucket
                .acquire_token()
                .and_then(|token| token.schedule_retry(RetryErrorType::Throttling));
            if let Ok(token) = retried {
                token.notify_failure();
            }
            black_box(bucket.available());
        });
    });

    group.finish();
}

// ============================================================================
// Rate Limiter Benchmarks
// ============================================================================

fn bench_rate_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiter");

    group.bench_function("cubic_success", |b| {
        let mut cubic = CubicRateCalculator::default().with_state(10.0, 5.0);
        let mut t = 5.0;
        b.iter(|| {
            t += 0.001;
            black_box(cubic.cubic_success(black_box(t)))
        });
    });

    group.bench_function("limiter_update_mixed", |b| {
        let limiter =
            AdaptiveRateLimiter::with_clock(AdaptiveRateLimiterConfig::default(), MockClock::new());
        let mut t = 0.0;
        let mut n = 0_u64;
        b.iter(|| {
            t += 0.05;
            n += 1;
            let error = (n % 50 == 0).then_some(RetryErrorType::Throttling);
            black_box(limiter.update_at(t, error))
        });
    });

    group.finish();
}

// ============================================================================
// Strategy Benchmarks
// ============================================================================

fn bench_strategy(c: &mut Criterion) {
    let runtime = RuntimeBuilder::new_current_thread()
        .enable_time()
        .build()
        .expect("tokio runtime for benchmarks");
    let mut group = c.benchmark_group("strategy");

    group.bench_function("standard_first_try_success", |b| {
        let strategy = StandardRetryStrategy::with_defaults();
        b.to_async(&runtime).iter(|| async {
            let result = strategy
                .retry(&AlwaysRetry::default(), || async { Ok::<_, std::io::Error>(200_u16) })
                .await;
            black_box(result.is_ok())
        });
    });

    group.bench_function("standard_one_retry", |b| {
        let strategy = StandardRetryStrategy::new(
            StandardRetryStrategyOptions::default(),
            StandardRetryTokenBucket::with_defaults(),
            ExponentialBackoffWithJitter::new(
                ExponentialBackoffWithJitterOptions::builder()
                    .initial_delay(Duration::ZERO)
                    .no_jitter()
                    .build()
                    .expect("valid backoff options for benchmarks"),
            ),
        );
        b.to_async(&runtime).iter(|| async {
            let mut failed = false;
            let result = strategy
                .retry(&AlwaysRetry::default(), || {
                    let fail = !failed;
                    failed = true;
                    async move {
                        if fail {
                            Err(std::io::Error::other("transient"))
                        } else {
                            Ok(200_u16)
                        }
                    }
                })
                .await;
            black_box(result.is_ok())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_backoff, bench_token_bucket, bench_rate_limiter, bench_strategy);
criterion_main!(benches);
