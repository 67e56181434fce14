//! Clock seam for time-dependent decisions (expiry, heartbeats, grants).

use chrono::{DateTime, Utc};
use std::sync::Arc;

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Clock handle shared by services and the HTTP state.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Frozen clock for tests. Interior mutability lets a test keep an
/// `Arc<MockClock>` and move time while services hold the same handle.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug)]
pub struct MockClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: parking_lot::Mutex::new(now),
        }
    }

    pub fn from_rfc3339(s: &str) -> Self {
        Self::new(
            DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        )
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock();
        *now += duration;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock()
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
    fn mock_clock_is_frozen_until_advanced() {
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z");
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-01-15T12:00:00+00:00");
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-01-15T12:00:00+00:00");

        clock.advance(chrono::Duration::minutes(90));
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-01-15T13:30:00+00:00");
    }

    #[test]
    fn mock_clock_moves_through_shared_handle() {
        let clock = Arc::new(MockClock::from_rfc3339("2025-01-15T12:00:00Z"));
        let shared: SharedClock = clock.clone();

        clock.advance(chrono::Duration::hours(1));
        assert_eq!(shared.now_utc().to_rfc3339(), "2025-01-15T13:00:00+00:00");
    }
}
