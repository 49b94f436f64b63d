//! Time source abstraction.
//!
//! Cache expiry and the `date_within_days` operator both read "now". The
//! engine takes a [`Clock`] so tests can move time without sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::value::Timestamp;

/// Abstraction over the wall clock.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Real clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from(chrono::Utc::now())
    }
}

/// Manually driven clock for tests.
///
/// ```
/// use std::time::Duration;
/// use standout_query::{Clock, MockClock, Timestamp};
///
/// let clock = MockClock::new(Timestamp(1_000));
/// clock.advance(Duration::from_secs(2));
/// assert_eq!(clock.now(), Timestamp(3_000));
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    millis: AtomicI64,
}

impl MockClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.as_millis()),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    /// Jumps the clock to an absolute time.
    pub fn set(&self, to: Timestamp) {
        self.millis.store(to.as_millis(), Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        let now = SystemClock.now();
        assert!(now > Timestamp::parse("2020-01-01").unwrap());
    }

    #[test]
    fn mock_clock_moves_only_when_told() {
        let clock = MockClock::new(Timestamp(0));
        assert_eq!(clock.now(), Timestamp(0));
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Timestamp(250));
        clock.set(Timestamp(10));
        assert_eq!(clock.now(), Timestamp(10));
    }
}
