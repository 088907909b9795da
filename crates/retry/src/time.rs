//! Monotonic time sources
//!
//! Token bucket refills and rate-limiter measurements read time through
//! [`Clock`]. Production code uses [`SystemClock`]; tests hand a shared
//! [`MockClock`] to the component and step it by hand.
//!
//! ```
//! use std::time::Duration;
//!
//! use clientrt_retry::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let origin = clock.origin();
//! clock.advance(Duration::from_millis(250));
//! assert_eq!(clock.seconds_since(origin), 0.25);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of monotonic instants
///
/// Refill and throughput calculations never see a wall clock jump backwards.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Seconds elapsed since `origin`, as a float
    ///
    /// Saturates to `0.0` if `origin` lies in the future.
    fn seconds_since(&self, origin: Instant) -> f64 {
        self.now().saturating_duration_since(origin).as_secs_f64()
    }
}

/// `Instant::now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually stepped clock
///
/// Clones share one elapsed counter, so a test keeps a handle while the
/// bucket or limiter under test holds another.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Anchored at the current instant; moves only when stepped
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Step the clock forward
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Step by fractional seconds, as fixture timestamps are written
    pub fn advance_secs_f64(&self, seconds: f64) {
        self.advance(Duration::from_secs_f64(seconds));
    }

    /// Jump to an absolute offset from the origin
    ///
    /// Moving backwards is allowed; consumers saturate negative intervals.
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Time stepped since the origin
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }

    /// The instant this clock considers its origin
    #[must_use]
    pub fn origin(&self) -> Instant {
        self.start
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
