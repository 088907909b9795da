// Per-call summary of a retried operation
use std::fmt;
use std::time::Duration;

use crate::error::ExhaustionKind;

/// What happened while retrying one logical call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryMetrics {
    /// Number of attempts started
    pub attempts: u32,
    /// Backoff delay chosen before each retry, in order
    pub delays: Vec<Duration>,
    /// Total delay accumulated across all retries
    pub total_delay: Duration,
    /// Whether the operation ultimately succeeded
    pub succeeded: bool,
    /// Whether the call was cancelled
    pub cancelled: bool,
    /// Which limit ended the call, if one did
    pub exhaustion: Option<ExhaustionKind>,
}

impl RetryMetrics {
    /// Create new metrics with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_delay(&mut self, delay: Duration) {
        self.delays.push(delay);
        self.total_delay = self.total_delay.saturating_add(delay);
    }

    /// Number of retries scheduled
    pub fn retries(&self) -> u32 {
        u32::try_from(self.delays.len()).unwrap_or(u32::MAX)
    }

    /// Get the average delay between attempts
    pub fn average_delay(&self) -> Option<Duration> {
        match self.retries() {
            0 => None,
            n => Some(self.total_delay / n),
        }
    }
}

impl fmt::Display for RetryMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryMetrics {{ attempts: {}, retries: {}, total_delay: {:?}, succeeded: {}, cancelled: {} }}",
            self.attempts,
            self.retries(),
            self.total_delay,
            self.succeeded,
            self.cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_delay_accumulates() {
        let mut metrics = RetryMetrics::new();
        metrics.record_delay(Duration::from_secs(1));
        metrics.record_delay(Duration::from_secs(2));

        assert_eq!(metrics.retries(), 2);
        assert_eq!(metrics.total_delay, Duration::from_secs(3));
        assert_eq!(metrics.average_delay(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_no_retries_has_no_average() {
        assert_eq!(RetryMetrics::new().average_delay(), None);
    }

    #[test]
    fn test_display() {
        let metrics = RetryMetrics { attempts: 1, succeeded: true, ..RetryMetrics::default() };
        let rendered = metrics.to_string();
        assert!(rendered.contains("attempts: 1"));
        assert!(rendered.contains("succeeded: true"));
    }
}
