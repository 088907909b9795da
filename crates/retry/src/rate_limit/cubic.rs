// Cubic send-rate curve
use crate::constants::{DEFAULT_BETA, DEFAULT_SCALE_CONSTANT};

/// TCP-Cubic rate calculator
///
/// All times are seconds on the caller's timeline. The calculator holds no
/// clock and no lock; the rate limiter serializes access.
///
/// After a throttle at time `T` with rate `R` the curve is
/// `rate(t) = C * (t - T - K)^3 + R` where `K = cbrt(R * (1 - β) / C)`, so
/// `rate(T) = β * R` and the curve flattens out at `R` after `K` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicRateCalculator {
    beta: f64,
    scale_constant: f64,
    last_max_rate: f64,
    last_throttle_time: f64,
    time_window: f64,
}

impl Default for CubicRateCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_BETA, DEFAULT_SCALE_CONSTANT)
    }
}

impl CubicRateCalculator {
    /// Create a calculator with no recorded throttle
    pub fn new(beta: f64, scale_constant: f64) -> Self {
        Self { beta, scale_constant, last_max_rate: 0.0, last_throttle_time: 0.0, time_window: 0.0 }
    }

    /// Start from a known maximum, as if a throttle had occurred at
    /// `last_throttle_time`
    pub fn with_state(mut self, last_max_rate: f64, last_throttle_time: f64) -> Self {
        self.last_max_rate = last_max_rate;
        self.last_throttle_time = last_throttle_time;
        self
    }

    /// Rate in effect when the last throttle happened
    pub fn last_max_rate(&self) -> f64 {
        self.last_max_rate
    }

    /// Time of the last throttle
    pub fn last_throttle_time(&self) -> f64 {
        self.last_throttle_time
    }

    /// Seconds between the last throttle and the most recent calculation
    pub fn time_window(&self) -> f64 {
        self.time_window
    }

    /// Seconds since the last throttle, as of `now`
    pub fn calculate_time_window(&mut self, now: f64) -> f64 {
        self.time_window = now - self.last_throttle_time;
        self.time_window
    }

    /// Time from the throttle until the curve is back at `last_max_rate`
    ///
    /// Zero when no maximum is known; `cbrt` keeps that case free of NaN.
    pub fn inflection_offset(&self) -> f64 {
        (self.last_max_rate * (1.0 - self.beta) / self.scale_constant).cbrt()
    }

    /// Rate allowed at `now` while no throttling is observed
    pub fn cubic_success(&mut self, now: f64) -> f64 {
        let t = self.calculate_time_window(now);
        let dt = t - self.inflection_offset();
        self.scale_constant * dt.powi(3) + self.last_max_rate
    }

    /// Record a throttle at `now` while sending at `current_rate`
    ///
    /// Returns the reduced rate, `current_rate * β`.
    pub fn cubic_throttle(&mut self, current_rate: f64, now: f64) -> f64 {
        self.last_max_rate = current_rate;
        self.last_throttle_time = now;
        self.time_window = 0.0;
        current_rate * self.beta
    }
}
