use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time reading used by [`FrameClock`](super::FrameClock).
///
/// Readings are offsets from an arbitrary, fixed origin and must never
/// decrease.
pub trait TimeSource {
    fn now(&self) -> Duration;
}

/// Wall-clock source backed by `std::time::Instant`.
#[derive(Debug, Clone)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    #[inline]
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced source.
///
/// Clones share one reading, so a test can keep a handle while the clock
/// owns another, and a listener can advance time to simulate dispatch cost.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    now: Rc<Cell<Duration>>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Moves the reading to `to`. Earlier values are ignored.
    pub fn set(&self, to: Duration) {
        if to > self.now.get() {
            self.now.set(to);
        }
    }
}

impl TimeSource for ManualTime {
    #[inline]
    fn now(&self) -> Duration {
        self.now.get()
    }
}
