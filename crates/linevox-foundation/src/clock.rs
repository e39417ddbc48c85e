//! Clock abstraction so debounce windows, recording durations and wire
//! timestamps can run against virtual time in tests and offline replay.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Time source used throughout the engine.
pub trait Clock: Send + Sync {
    /// Monotonic now, for durations and debounce windows.
    fn now(&self) -> Instant;

    /// Wall-clock seconds since the Unix epoch, for filenames and wire
    /// timestamps.
    fn unix_seconds(&self) -> i64;
}

/// OS-backed clock.
pub struct RealClock;

impl RealClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_seconds(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Manually-advanced clock for deterministic tests and offline analysis,
/// where frames are fed faster than real time.
pub struct VirtualClock {
    inner: Mutex<VirtualNow>,
}

struct VirtualNow {
    instant: Instant,
    unix_millis: i64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(unix_seconds: i64) -> Self {
        Self {
            inner: Mutex::new(VirtualNow {
                instant: Instant::now(),
                unix_millis: unix_seconds * 1000,
            }),
        }
    }

    /// Advance virtual time by `duration`.
    pub fn advance(&self, duration: std::time::Duration) {
        let mut now = self.inner.lock();
        now.instant += duration;
        now.unix_millis += duration.as_millis() as i64;
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.inner.lock().instant
    }

    fn unix_seconds(&self) -> i64 {
        self.inner.lock().unix_millis / 1000
    }
}

/// Thread-safe clock handle shared across the engine.
pub type SharedClock = std::sync::Arc<dyn Clock>;

pub fn real_clock() -> SharedClock {
    std::sync::Arc::new(RealClock::new())
}
