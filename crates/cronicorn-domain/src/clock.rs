//! The single source of monotonic wall-clock time (C1).
//!
//! All scheduling arithmetic in this workspace goes through a `Clock`
//! rather than calling `Utc::now()` directly, so tests can inject a fake
//! clock instead of sleeping.

use chrono::{DateTime, Utc};

/// Injected time capability. `SystemClock` is the production implementation;
/// tests use [`FakeClock`].
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that returns a fixed (but externally adjustable) instant.
///
/// Uses interior mutability (`parking_lot::Mutex`) so it can be shared via
/// `Arc<FakeClock>` across async tasks while still letting a test advance
/// the clock between assertions.
pub struct FakeClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: parking_lot::Mutex::new(start),
        }
    }

    pub fn set(&self, t: DateTime<Utc>) {
        *self.now.lock() = t;
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.now.lock();
        *guard = *guard + delta;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = FakeClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(60));
    }
}
