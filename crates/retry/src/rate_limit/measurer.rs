// Smoothed measurement of the client's actual send rate
use std::time::Duration;

use crate::constants::{DEFAULT_MEASUREMENT_BUCKET, DEFAULT_SMOOTHING};

/// EWMA of completed requests per second
///
/// Time is cut into slots of `bucket_width` seconds. Requests are counted
/// until a sample lands in a later slot; the count divided by the slot
/// distance is blended into the measured rate with weight `smoothing`.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveRateMeasurer {
    smoothing: f64,
    bucket_width: f64,
    measured_tx_rate: f64,
    last_tx_rate_bucket: f64,
    request_count: u64,
    error_count: u64,
    total_errors: u64,
}

impl Default for AdaptiveRateMeasurer {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING, DEFAULT_MEASUREMENT_BUCKET)
    }
}

impl AdaptiveRateMeasurer {
    /// A zero `bucket_width` falls back to the default slot width.
    pub fn new(smoothing: f64, bucket_width: Duration) -> Self {
        let width = if bucket_width.is_zero() { DEFAULT_MEASUREMENT_BUCKET } else { bucket_width };
        Self {
            smoothing,
            bucket_width: width.as_secs_f64(),
            measured_tx_rate: 0.0,
            last_tx_rate_bucket: 0.0,
            request_count: 0,
            error_count: 0,
            total_errors: 0,
        }
    }

    /// Smoothed requests per second
    pub fn measured_tx_rate(&self) -> f64 {
        self.measured_tx_rate
    }

    /// Start of the slot the last rate sample closed
    pub fn last_tx_rate_bucket(&self) -> f64 {
        self.last_tx_rate_bucket
    }

    /// Requests counted in the slot still open
    pub fn pending_requests(&self) -> u64 {
        self.request_count
    }

    /// Error samples counted in the slot still open
    pub fn pending_errors(&self) -> u64 {
        self.error_count
    }

    /// Error samples seen since creation
    pub fn total_errors(&self) -> u64 {
        self.total_errors
    }

    /// Record one completed request at `now` seconds
    ///
    /// Returns the measured rate after the update.
    pub fn update(&mut self, now: f64, is_error_sample: bool) -> f64 {
        let bucket = (now / self.bucket_width).floor() * self.bucket_width;
        self.request_count += 1;
        if is_error_sample {
            self.error_count += 1;
            self.total_errors += 1;
        }

        if bucket > self.last_tx_rate_bucket {
            #[allow(clippy::cast_precision_loss)]
            let current_rate = self.request_count as f64 / (bucket - self.last_tx_rate_bucket);
            self.measured_tx_rate =
                current_rate * self.smoothing + self.measured_tx_rate * (1.0 - self.smoothing);
            self.request_count = 0;
            self.error_count = 0;
            self.last_tx_rate_bucket = bucket;
        }

        self.measured_tx_rate
    }
}
