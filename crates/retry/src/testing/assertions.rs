//! Custom assertions for testing

// These assertions panic on failure; that is their purpose
#![allow(clippy::missing_panics_doc)]

use std::time::Duration;

/// Assert that two values are approximately equal (for floats)
///
/// # Examples
///
/// ```
/// use clientrt_retry::testing::assert_approx_eq;
///
/// assert_approx_eq(9.64893600966, 9.648936, 1e-6);
/// ```
pub fn assert_approx_eq(actual: f64, expected: f64, epsilon: f64) {
    let diff = (actual - expected).abs();
    assert!(
        diff < epsilon,
        "Values not approximately equal: {actual} vs {expected} (diff: {diff})"
    );
}

/// Assert that a duration is within an acceptable range
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use clientrt_retry::testing::assert_duration_in_range;
///
/// let actual = Duration::from_millis(105);
/// assert_duration_in_range(actual, Duration::from_millis(100), Duration::from_millis(10));
/// ```
pub fn assert_duration_in_range(actual: Duration, expected: Duration, tolerance: Duration) {
    let min = expected.saturating_sub(tolerance);
    let max = expected.saturating_add(tolerance);

    assert!(actual >= min && actual <= max, "Duration {actual:?} not in range [{min:?}, {max:?}]");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_approx_eq_passes_within_epsilon() {
        assert_approx_eq(1.000_000_1, 1.0, 1e-6);
    }

    #[test]
    #[should_panic(expected = "Values not approximately equal")]
    fn test_assert_approx_eq_fails_outside_epsilon() {
        assert_approx_eq(1.1, 1.0, 1e-6);
    }

    #[test]
    #[should_panic(expected = "not in range")]
    fn test_assert_duration_in_range_fails() {
        assert_duration_in_range(
            Duration::from_millis(200),
            Duration::from_millis(100),
            Duration::from_millis(10),
        );
    }
}
