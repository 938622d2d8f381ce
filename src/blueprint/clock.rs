//! Clock abstraction for the sonar timestamp
//!
//! Production code uses `SystemClock` which delegates to `chrono::Utc::now()`.
//! Tests use `MockClock` to pin the second-of-minute.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing with controllable time
#[cfg(test)]
#[allow(clippy::expect_used)]
pub struct MockClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    /// Clock fixed at the given second of an arbitrary minute
    pub fn at_second(second: u32) -> Self {
        use chrono::TimeZone;
        let now = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 30, second)
            .single()
            .expect("valid test timestamp");
        Self::new(now)
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().expect("MockClock lock poisoned");
        *now += duration;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("MockClock lock poisoned")
    }
}
