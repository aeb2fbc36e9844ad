//! Monotonic time sources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Trait representing the monotonic clock used for calibration windows,
/// counter staleness, notifier intervals and telemetry timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic time source for replays and tests.
///
/// Time only moves when the caller advances it, so a recording replays the
/// same way regardless of how fast it is fed.
pub struct ManualTimeSource {
    start: Instant,
    offset_us: AtomicU64,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_us: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_us
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute offset from the start; never moves backwards.
    pub fn set_elapsed(&self, elapsed: Duration) {
        self.offset_us
            .fetch_max(elapsed.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.load(Ordering::SeqCst))
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_time_only_moves_forward() {
        let clock = ManualTimeSource::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(40));
        assert_eq!(clock.now() - t0, Duration::from_millis(40));

        clock.set_elapsed(Duration::from_millis(10));
        assert_eq!(clock.elapsed(), Duration::from_millis(40));
        clock.set_elapsed(Duration::from_secs(2));
        assert_eq!(clock.now() - t0, Duration::from_secs(2));
    }
}
