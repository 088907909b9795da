//! Conformance tests against the YAML fixtures in `tests/fixtures/`
//!
//! Run with: `cargo test -p clientrt-retry --features test-utils --test
//! conformance`

#![cfg(feature = "test-utils")]

use clientrt_retry::testing::{
    assert_approx_eq, fixtures_dir, load_fixture, RateFixture, StandardRetryFixture,
};

const TOLERANCE: f64 = 1e-6;

/// Validates every standard-strategy scenario.
///
/// Each scenario scripts the status codes of one call. The runner replays
/// them on a paused runtime and records, per attempt, the outcome, the
/// remaining retry quota and the backoff delay.
///
/// # Test Steps
/// 1. Load `standard_retry.yaml`
/// 2. Replay each scenario against a fresh strategy and bucket
/// 3. Compare the observed steps with the expected ones
#[tokio::test(start_paused = true)]
async fn test_standard_retry_fixtures() {
    let fixtures: Vec<StandardRetryFixture> =
        load_fixture(fixtures_dir().join("standard_retry.yaml"))
            .expect("standard retry fixtures should load");
    assert!(!fixtures.is_empty());

    for fixture in &fixtures {
        let observed = fixture.run().await;
        assert_eq!(observed, fixture.expected(), "scenario `{}`", fixture.name);
    }
}

/// Validates the cubic recovery curve after a throttle.
#[test]
fn test_cubic_success_fixture() {
    let fixture: RateFixture = load_fixture(fixtures_dir().join("cubic_success.yaml"))
        .expect("cubic success fixture should load");

    let rates = fixture.run_cubic();
    assert_eq!(rates.len(), fixture.cases.len());
    for (case, rate) in fixture.cases.iter().zip(rates) {
        let expected = case.calculated_rate.expect("every case has a calculated rate");
        assert_approx_eq(rate, expected, TOLERANCE);
    }
}

/// Validates cubic throttle reductions interleaved with recovery.
///
/// # Test Steps
/// 1. Start from a max rate of 10 throttled at t=5
/// 2. Apply each timestamped success or throttle
/// 3. Compare the produced rate to the reference value
#[test]
fn test_cubic_throttle_fixture() {
    let fixture: RateFixture = load_fixture(fixtures_dir().join("cubic_throttle.yaml"))
        .expect("cubic throttle fixture should load");

    for (case, rate) in fixture.cases.iter().zip(fixture.run_cubic()) {
        let expected = case.calculated_rate.expect("every case has a calculated rate");
        assert_approx_eq(rate, expected, TOLERANCE);
    }
}

/// Validates measured and refill rates through the adaptive limiter.
///
/// # Test Steps
/// 1. Feed one outcome every 0.2s into a default limiter
/// 2. Compare the smoothed transmit rate after each outcome
/// 3. Compare the refill rate returned for each outcome
#[test]
fn test_client_sending_rates_fixture() {
    let fixture: RateFixture = load_fixture(fixtures_dir().join("client_sending_rates.yaml"))
        .expect("client sending rates fixture should load");
    assert!(fixture.given.is_none());

    for (case, (measured, fill)) in fixture.cases.iter().zip(fixture.run_limiter()) {
        if let Some(expected) = case.measured_tx_rate {
            assert_approx_eq(measured, expected, TOLERANCE);
        }
        if let Some(expected) = case.new_token_bucket_rate {
            assert_approx_eq(fill, expected, TOLERANCE);
        }
    }
}
