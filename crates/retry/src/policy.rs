//! Classification of call outcomes into retry directives
//!
//! The strategy never inspects results itself; it asks a [`RetryPolicy`]
//! what one attempt's outcome means. Any `Fn(&Result<T, E>) -> RetryDirective`
//! is a policy, and a few stock policies cover the common shapes.

use std::fmt;

/// Why a failed attempt may be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryErrorType {
    /// Timeout-like failure (connection reset, socket timeout)
    Transient,
    /// The service asked the client to slow down
    Throttling,
    /// The request itself was at fault but may succeed on retry
    ClientSide,
    /// The service failed to handle a valid request
    ServerSide,
}

impl RetryErrorType {
    /// Check if this kind should slow the client down
    pub fn is_throttling(self) -> bool {
        self == Self::Throttling
    }
}

impl fmt::Display for RetryErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Transient => "transient",
            Self::Throttling => "throttling",
            Self::ClientSide => "client-side",
            Self::ServerSide => "server-side",
        };
        f.write_str(label)
    }
}

/// The policy's verdict on one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryDirective {
    /// Stop and hand the result to the caller
    TerminateAndSucceed,
    /// Stop and hand the original error to the caller
    TerminateAndFail,
    /// Try again, charging the retry cost for this kind of failure
    RetryError(RetryErrorType),
}

impl RetryDirective {
    /// Failure kind carried by a retry directive
    pub fn retry_kind(self) -> Option<RetryErrorType> {
        match self {
            Self::RetryError(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Decides what an attempt's outcome means
///
/// Evaluation must be total: an outcome the policy cannot interpret maps
/// to [`RetryDirective::TerminateAndFail`].
pub trait RetryPolicy<T, E>: Send + Sync {
    fn evaluate(&self, result: &Result<T, E>) -> RetryDirective;
}

impl<T, E, F> RetryPolicy<T, E> for F
where
    F: Fn(&Result<T, E>) -> RetryDirective + Send + Sync,
{
    fn evaluate(&self, result: &Result<T, E>) -> RetryDirective {
        self(result)
    }
}

/// Error types that know their own retry classification
pub trait ClassifyRetry {
    /// `None` means the error is not retryable
    fn retry_kind(&self) -> Option<RetryErrorType>;
}

impl ClassifyRetry for std::io::Error {
    fn retry_kind(&self) -> Option<RetryErrorType> {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::TimedOut
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::BrokenPipe
            | ErrorKind::Interrupted
            | ErrorKind::UnexpectedEof => Some(RetryErrorType::Transient),
            _ => None,
        }
    }
}

/// `Ok` succeeds; errors are classified by [`ClassifyRetry`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRetryPolicy;

impl<T, E: ClassifyRetry> RetryPolicy<T, E> for StandardRetryPolicy {
    fn evaluate(&self, result: &Result<T, E>) -> RetryDirective {
        match result {
            Ok(_) => RetryDirective::TerminateAndSucceed,
            Err(e) => e
                .retry_kind()
                .map_or(RetryDirective::TerminateAndFail, RetryDirective::RetryError),
        }
    }
}

/// Retry every error as the given kind
#[derive(Debug, Clone, Copy)]
pub struct AlwaysRetry(pub RetryErrorType);

impl Default for AlwaysRetry {
    fn default() -> Self {
        Self(RetryErrorType::Transient)
    }
}

impl<T, E> RetryPolicy<T, E> for AlwaysRetry {
    fn evaluate(&self, result: &Result<T, E>) -> RetryDirective {
        match result {
            Ok(_) => RetryDirective::TerminateAndSucceed,
            Err(_) => RetryDirective::RetryError(self.0),
        }
    }
}

/// Never retry
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl<T, E> RetryPolicy<T, E> for NeverRetry {
    fn evaluate(&self, result: &Result<T, E>) -> RetryDirective {
        match result {
            Ok(_) => RetryDirective::TerminateAndSucceed,
            Err(_) => RetryDirective::TerminateAndFail,
        }
    }
}

/// Classifies errors by their rendered message
///
/// For error types that carry no structured classification. Patterns are
/// matched case-insensitively against `Display` output, throttling first,
/// then transient, then server-side.
#[derive(Debug, Clone)]
pub struct MessagePatternPolicy {
    throttling: Vec<String>,
    transient: Vec<String>,
    server_side: Vec<String>,
}

impl Default for MessagePatternPolicy {
    fn default() -> Self {
        let owned = |patterns: &[&str]| -> Vec<String> {
            patterns.iter().map(|p| (*p).to_string()).collect()
        };
        Self {
            throttling: owned(&[
                "rate limit",
                "too many requests",
                "429",
                "throttl",
                "quota exceeded",
                "slow down",
            ]),
            transient: owned(&[
                "connection",
                "timeout",
                "timed out",
                "dns",
                "refused",
                "reset",
                "broken pipe",
                "unreachable",
            ]),
            server_side: owned(&[
                "internal server error",
                "service unavailable",
                "bad gateway",
                "gateway timeout",
                "500",
                "502",
                "503",
                "504",
            ]),
        }
    }
}

impl MessagePatternPolicy {
    /// Policy with the default patterns
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy with no patterns; every error terminates until some are added
    pub fn empty() -> Self {
        Self { throttling: Vec::new(), transient: Vec::new(), server_side: Vec::new() }
    }

    /// Add a pattern for `kind`
    ///
    /// Client-side patterns are not supported and are ignored; client-side
    /// classification needs structured errors.
    pub fn with_pattern(mut self, kind: RetryErrorType, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into().to_lowercase();
        match kind {
            RetryErrorType::Throttling => self.throttling.push(pattern),
            RetryErrorType::Transient => self.transient.push(pattern),
            RetryErrorType::ServerSide => self.server_side.push(pattern),
            RetryErrorType::ClientSide => {}
        }
        self
    }

    /// Classify a message
    pub fn classify(&self, message: &str) -> Option<RetryErrorType> {
        let message = message.to_lowercase();
        let matches = |patterns: &[String]| patterns.iter().any(|p| message.contains(p.as_str()));

        if matches(&self.throttling) {
            Some(RetryErrorType::Throttling)
        } else if matches(&self.transient) {
            Some(RetryErrorType::Transient)
        } else if matches(&self.server_side) {
            Some(RetryErrorType::ServerSide)
        } else {
            None
        }
    }
}

impl<T, E: fmt::Display> RetryPolicy<T, E> for MessagePatternPolicy {
    fn evaluate(&self, result: &Result<T, E>) -> RetryDirective {
        match result {
            Ok(_) => RetryDirective::TerminateAndSucceed,
            Err(e) => self
                .classify(&e.to_string())
                .map_or(RetryDirective::TerminateAndFail, RetryDirective::RetryError),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for policy.
    use std::io;

    use super::*;

    #[test]
    fn test_closure_is_a_policy() {
        let policy = |result: &Result<u16, String>| match result {
            Ok(status) if *status < 300 => RetryDirective::TerminateAndSucceed,
            Ok(429) => RetryDirective::RetryError(RetryErrorType::Throttling),
            Ok(_) => RetryDirective::TerminateAndFail,
            Err(_) => RetryDirective::RetryError(RetryErrorType::Transient),
        };

        assert_eq!(policy.evaluate(&Ok(200)), RetryDirective::TerminateAndSucceed);
        assert_eq!(
            policy.evaluate(&Ok(429)),
            RetryDirective::RetryError(RetryErrorType::Throttling)
        );
        assert_eq!(policy.evaluate(&Err("reset".into())).retry_kind(), Some(RetryErrorType::Transient));
    }

    /// Validates io errors classify through `ClassifyRetry`.
    ///
    /// Assertions:
    /// - Timeouts and resets are transient.
    /// - Not-found terminates.
    #[test]
    fn test_standard_policy_with_io_errors() {
        let policy = StandardRetryPolicy;
        let timeout: Result<(), io::Error> = Err(io::Error::from(io::ErrorKind::TimedOut));
        let reset: Result<(), io::Error> = Err(io::Error::from(io::ErrorKind::ConnectionReset));
        let missing: Result<(), io::Error> = Err(io::Error::from(io::ErrorKind::NotFound));

        assert_eq!(policy.evaluate(&timeout), RetryDirective::RetryError(RetryErrorType::Transient));
        assert_eq!(policy.evaluate(&reset), RetryDirective::RetryError(RetryErrorType::Transient));
        assert_eq!(policy.evaluate(&missing), RetryDirective::TerminateAndFail);
        assert_eq!(
            RetryPolicy::<(), io::Error>::evaluate(&policy, &Ok(())),
            RetryDirective::TerminateAndSucceed
        );
    }

    #[test]
    fn test_always_and_never_retry() {
        let err: Result<(), &str> = Err("boom");

        assert_eq!(
            AlwaysRetry(RetryErrorType::ServerSide).evaluate(&err),
            RetryDirective::RetryError(RetryErrorType::ServerSide)
        );
        assert_eq!(AlwaysRetry::default().evaluate(&err).retry_kind(), Some(RetryErrorType::Transient));
        assert_eq!(NeverRetry.evaluate(&err), RetryDirective::TerminateAndFail);
        assert_eq!(NeverRetry.evaluate(&Ok::<(), &str>(())), RetryDirective::TerminateAndSucceed);
    }

    /// Tests message classification order and case-insensitivity.
    ///
    /// Verifies:
    /// - Throttling wins over transient when both match
    /// - Server-side status text is recognized
    /// - Unknown messages terminate
    #[test]
    fn test_message_pattern_policy() {
        let policy = MessagePatternPolicy::new();

        assert_eq!(policy.classify("HTTP 429 Too Many Requests"), Some(RetryErrorType::Throttling));
        assert_eq!(
            policy.classify("Rate limit hit, connection closed"),
            Some(RetryErrorType::Throttling)
        );
        assert_eq!(policy.classify("Connection reset by peer"), Some(RetryErrorType::Transient));
        assert_eq!(policy.classify("503 Service Unavailable"), Some(RetryErrorType::ServerSide));
        assert_eq!(policy.classify("invalid parameter"), None);

        let err: Result<(), String> = Err("access denied".to_string());
        assert_eq!(policy.evaluate(&err), RetryDirective::TerminateAndFail);
    }

    #[test]
    fn test_message_pattern_policy_custom_patterns() {
        let policy = MessagePatternPolicy::empty()
            .with_pattern(RetryErrorType::Throttling, "ProvisionedThroughputExceeded")
            .with_pattern(RetryErrorType::ClientSide, "ignored");

        assert_eq!(
            policy.classify("provisionedthroughputexceeded: slow"),
            Some(RetryErrorType::Throttling)
        );
        assert_eq!(policy.classify("ignored"), None);
        assert_eq!(policy.classify("connection reset"), None);
    }
}
