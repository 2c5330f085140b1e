//! Time sources for span measurements.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A source of monotonic elapsed-time readings.
///
/// Readings are expressed as the time elapsed since a clock-specific origin. Only the
/// difference between two readings of the same clock carries meaning, so the origin itself
/// is never exposed.
///
/// A [`Stopwatch`][crate::Stopwatch] queries its clock once when a span is entered and once
/// when it is exited, unless the caller supplies explicit timestamps.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Debug {
    /// Returns the time elapsed since the origin of this clock.
    ///
    /// Consecutive readings must never decrease.
    fn now(&self) -> Duration;
}

/// The default clock, backed by [`std::time::Instant`].
///
/// The origin is the moment the clock was created.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose origin is the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same reading, so a test (or a replay tool feeding recorded timestamps)
/// can keep one handle while the stopwatch owns another.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use scope_timer::{ManualClock, Stopwatch};
///
/// let clock = ManualClock::new();
/// let stopwatch = Stopwatch::builder().clock(clock.clone()).build();
///
/// {
///     let _root = stopwatch.timer("root");
///     clock.advance(Duration::from_millis(25));
/// }
///
/// let report = stopwatch.last_aggregated_report().unwrap();
/// assert_eq!(report.root_duration(), Duration::from_millis(25));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    reading: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Creates a clock that reads zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current reading of this clock and all of its clones.
    ///
    /// Setting a reading lower than the current one is permitted; measurements taken across
    /// such a jump saturate to zero instead of underflowing.
    pub fn set(&self, reading: Duration) {
        *self.lock() = reading;
    }

    /// Moves the reading of this clock and all of its clones forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut reading = self.lock();
        *reading = reading.saturating_add(delta);
    }

    fn lock(&self) -> MutexGuard<'_, Duration> {
        // The guarded value is a plain Duration, so a poisoned lock still holds a valid reading.
        self.reading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.lock()
    }
}
