//! Structured logging for retried calls
//!
//! One [`RetrySpan`] follows one logical call through its attempts. Events
//! go through the `tracing` crate; installing a subscriber is left to the
//! application.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ExhaustionKind;
use crate::policy::RetryErrorType;

/// Opens a [`RetrySpan`] per call
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryTracer;

impl RetryTracer {
    /// Create a new retry tracer
    pub fn new() -> Self {
        Self
    }

    /// Start a retry span for `operation`
    pub fn start_retry_span(&self, operation: &str, max_attempts: u32) -> RetrySpan {
        debug!(operation, max_attempts, "starting retried call");
        RetrySpan { operation: operation.to_string(), max_attempts, attempts: 0 }
    }
}

/// Logging handle for one logical call
#[derive(Debug)]
pub struct RetrySpan {
    operation: String,
    max_attempts: u32,
    attempts: u32,
}

impl RetrySpan {
    /// Name of the traced operation
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record the start of an attempt
    pub fn record_attempt(&mut self, attempt: u32) {
        self.attempts = attempt;
        debug!(operation = %self.operation, attempt, max_attempts = self.max_attempts, "attempt started");
    }

    /// Record a retry that has been paid for and is about to sleep
    pub fn record_retry(
        &mut self,
        attempt: u32,
        kind: RetryErrorType,
        delay: Duration,
        remaining_capacity: u32,
    ) {
        info!(
            operation = %self.operation,
            attempt,
            %kind,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            remaining_capacity,
            "scheduling retry"
        );
    }

    /// Record a successful call
    pub fn record_success(&mut self, attempts: u32, total_delay: Duration) {
        debug!(
            operation = %self.operation,
            attempts,
            total_delay_ms = u64::try_from(total_delay.as_millis()).unwrap_or(u64::MAX),
            "retried call succeeded"
        );
    }

    /// Record a non-retryable failure
    pub fn record_failure(&mut self, attempts: u32) {
        debug!(operation = %self.operation, attempts, "call failed with non-retryable outcome");
    }

    /// Record that a retry limit ended the call
    pub fn record_exhausted(&mut self, kind: ExhaustionKind, attempts: u32) {
        warn!(operation = %self.operation, attempts, reason = %kind, "retries exhausted");
    }

    /// Record cancellation
    pub fn record_cancelled(&mut self, attempts: u32, during_backoff: bool) {
        info!(operation = %self.operation, attempts, during_backoff, "retried call cancelled");
    }
}
