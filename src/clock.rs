//! Wall-clock abstraction.
//!
//! Freshness checks and machine bookkeeping read time through [`Clock`] so
//! tests can pin it.

use chrono::{DateTime, Utc};

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic tests. Shared handles see the same time.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    now: std::sync::Arc<std::sync::RwLock<DateTime<Utc>>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Arc::new(std::sync::RwLock::new(now)),
        }
    }

    /// Create a mock clock from an RFC 3339 string. Panics on bad input.
    pub fn from_rfc3339(s: &str) -> Self {
        Self::new(
            DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        )
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.write().expect("mock clock poisoned");
        *now += duration;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read().expect("mock clock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn system_clock_returns_time() {
        assert!(SystemClock.now_utc().year() >= 2024);
    }

    #[test]
    fn mock_clock_is_shared_between_clones() {
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z");
        let handle = clock.clone();
        handle.advance(chrono::Duration::hours(1));
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-01-15T13:00:00+00:00");
    }
}
