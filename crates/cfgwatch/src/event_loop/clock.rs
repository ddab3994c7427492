//! Time sources for the event loop.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Source of the current time for timer scheduling.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Instant;

    /// Returns `true` if time only moves when told to.
    ///
    /// A blocking loop turn never sleeps on a manual clock; it advances the
    /// clock to the next deadline instead.
    fn is_manual(&self) -> bool {
        false
    }

    /// Move time forward to `instant`. Ignored by real clocks.
    fn advance_to(&self, instant: Instant) {
        let _ = instant;
    }
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when advanced.
///
/// ```rust,ignore
/// let clock = Rc::new(ManualClock::new());
/// let event_loop = EventLoop::with_parts(clock.clone(), backend);
///
/// clock.advance(Duration::from_millis(1200));
/// event_loop.run_pending();
/// ```
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Time elapsed since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }

    fn is_manual(&self) -> bool {
        true
    }

    fn advance_to(&self, instant: Instant) {
        if let Some(by) = instant.checked_duration_since(self.now()) {
            self.advance(by);
        }
    }
}
