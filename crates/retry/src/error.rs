// Error types for the retry subsystem
use std::fmt;

use thiserror::Error;

/// Severity levels for monitoring and alerting
///
/// | Level | Use Case |
/// |-------|----------|
/// | **Info** | Expected conditions (cancellation) |
/// | **Warning** | Degraded but operational (quota or attempts exhausted) |
/// | **Error** | Failure requiring attention (bad configuration) |
/// | **Critical** | Integrity at risk |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Classification shared by every error type in this crate
pub trait ErrorClassification {
    /// Whether retrying the same call later could plausibly succeed
    fn is_retryable(&self) -> bool;

    /// Severity used for logging and alerting
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}

/// Which retry limit ended the attempt loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExhaustionKind {
    /// The attempt counter reached `max_attempts`
    MaxAttemptsExceeded,
    /// The token bucket could not pay for another retry
    InsufficientCapacity,
}

impl fmt::Display for ExhaustionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxAttemptsExceeded => f.write_str("maximum attempts exceeded"),
            Self::InsufficientCapacity => f.write_str("retry quota exceeded"),
        }
    }
}

/// Terminal outcome of a retried call
///
/// `E` is the operation's own error type. Non-retryable failures come back
/// as [`RetryError::Operation`] untouched.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The policy returned `TerminateAndFail`; the original error
    #[error(transparent)]
    Operation(E),

    /// A retry limit was hit while the call was still failing
    #[error("{kind} after {attempts} attempts")]
    Exhausted {
        kind: ExhaustionKind,
        attempts: u32,
        /// `None` when the last retryable outcome was an `Ok` value
        #[source]
        last_error: Option<E>,
    },

    /// The caller cancelled the call during an attempt or a backoff sleep
    #[error("retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    pub(crate) fn exhausted(kind: ExhaustionKind, attempts: u32, last_error: Option<E>) -> Self {
        Self::Exhausted { kind, attempts, last_error }
    }

    /// Which limit ended the loop, if any
    pub fn exhaustion_kind(&self) -> Option<ExhaustionKind> {
        match self {
            Self::Exhausted { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Check if the attempt limit ended the call
    pub fn is_max_attempts_exceeded(&self) -> bool {
        self.exhaustion_kind() == Some(ExhaustionKind::MaxAttemptsExceeded)
    }

    /// Check if the token bucket refused a retry
    pub fn is_insufficient_capacity(&self) -> bool {
        self.exhaustion_kind() == Some(ExhaustionKind::InsufficientCapacity)
    }

    /// Check if the caller cancelled the call
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The underlying operation error, if the outcome carried one
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::Exhausted { last_error, .. } => last_error.as_ref(),
            Self::Cancelled { .. } => None,
        }
    }

    /// Recover the underlying operation error, consuming `self`
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::Exhausted { last_error, .. } => last_error,
            Self::Cancelled { .. } => None,
        }
    }
}

impl<E> ErrorClassification for RetryError<E> {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Operation(_) => false,
            Self::Exhausted { kind, .. } => *kind == ExhaustionKind::InsufficientCapacity,
            Self::Cancelled { .. } => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Operation(_) => ErrorSeverity::Error,
            Self::Exhausted { .. } => ErrorSeverity::Warning,
            Self::Cancelled { .. } => ErrorSeverity::Info,
        }
    }
}

/// Errors raised by the retry token bucket
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenBucketError {
    #[error("insufficient retry capacity: requested {requested}, available {available}")]
    InsufficientCapacity { requested: u32, available: u32 },
}

impl ErrorClassification for TokenBucketError {
    fn is_retryable(&self) -> bool {
        true
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Warning
    }
}

/// Errors raised while validating or loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("failed to parse retry configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read retry configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue { field, message: message.into() }
    }
}

impl ErrorClassification for ConfigError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error.
    use super::*;

    #[derive(Debug, PartialEq, Eq, Error)]
    #[error("boom: {0}")]
    struct Boom(u16);

    /// Validates that non-retryable failures keep the original error.
    ///
    /// Assertions:
    /// - Display output is the operation error's own message.
    /// - `into_operation_error` hands back the same value.
    #[test]
    fn test_operation_error_is_transparent() {
        let err: RetryError<Boom> = RetryError::Operation(Boom(400));

        assert_eq!(err.to_string(), "boom: 400");
        assert!(err.exhaustion_kind().is_none());
        assert_eq!(err.into_operation_error(), Some(Boom(400)));
    }

    /// Validates the two exhaustion kinds can be told apart.
    ///
    /// Assertions:
    /// - Predicates match the kind each error was built with.
    /// - The last error is reachable through `operation_error`.
    #[test]
    fn test_exhaustion_kinds_are_distinguishable() {
        let attempts = RetryError::exhausted(ExhaustionKind::MaxAttemptsExceeded, 3, Some(Boom(502)));
        let quota = RetryError::exhausted(ExhaustionKind::InsufficientCapacity, 2, Some(Boom(500)));

        assert!(attempts.is_max_attempts_exceeded());
        assert!(!attempts.is_insufficient_capacity());
        assert!(quota.is_insufficient_capacity());
        assert!(!quota.is_max_attempts_exceeded());
        assert_eq!(attempts.operation_error(), Some(&Boom(502)));
        assert_eq!(attempts.to_string(), "maximum attempts exceeded after 3 attempts");
        assert_eq!(quota.to_string(), "retry quota exceeded after 2 attempts");
    }

    #[test]
    fn test_exhausted_source_chain() {
        use std::error::Error as _;

        let err = RetryError::exhausted(ExhaustionKind::MaxAttemptsExceeded, 3, Some(Boom(503)));
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("boom: 503"));

        let without: RetryError<Boom> =
            RetryError::exhausted(ExhaustionKind::MaxAttemptsExceeded, 3, None);
        assert!(without.source().is_none());
    }

    /// Validates classification of each retry outcome.
    ///
    /// Assertions:
    /// - Only quota exhaustion is retryable.
    /// - Cancellation is informational.
    #[test]
    fn test_retry_error_classification() {
        let cancelled: RetryError<Boom> = RetryError::Cancelled { attempts: 1 };
        let quota: RetryError<Boom> =
            RetryError::exhausted(ExhaustionKind::InsufficientCapacity, 1, None);
        let attempts: RetryError<Boom> =
            RetryError::exhausted(ExhaustionKind::MaxAttemptsExceeded, 3, None);

        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.severity(), ErrorSeverity::Info);
        assert!(quota.is_retryable());
        assert!(!attempts.is_retryable());
        assert!(!RetryError::Operation(Boom(1)).is_retryable());
        assert!(!attempts.is_critical());
    }

    #[test]
    fn test_token_bucket_error_display() {
        let err = TokenBucketError::InsufficientCapacity { requested: 5, available: 3 };
        assert_eq!(err.to_string(), "insufficient retry capacity: requested 5, available 3");
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_config_error_invalid_value() {
        let err = ConfigError::invalid("jitter", "must be within [0, 1]");
        assert_eq!(err.to_string(), "invalid value for `jitter`: must be within [0, 1]");
        assert!(!err.is_retryable());
    }
}
