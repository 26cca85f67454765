//! Wall-clock sources.
//!
//! Every timeout in a chart is a comparison between "now" and a stored
//! timestamp, so the clock is injected and tests drive it by hand.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Format used for timestamps written to the remote store.
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle and give
/// another to the engine.
///
/// ```rust
/// use parkgate::core::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance_secs(30);
/// assert_eq!((clock.now() - start).num_seconds(), 30);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(at)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Render a timestamp in [`DISPLAY_FORMAT`].
pub fn display(at: DateTime<Utc>) -> String {
    at.format(DISPLAY_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let before = other.now();

        clock.advance_secs(5);

        assert_eq!(other.now() - before, Duration::seconds(5));
    }

    #[test]
    fn display_uses_day_first_format() {
        let at = Utc.with_ymd_and_hms(2026, 10, 14, 9, 5, 3).unwrap();
        assert_eq!(display(at), "14/10/2026 09:05:03");
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
