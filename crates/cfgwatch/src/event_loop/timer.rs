//! Single-shot timers.
//!
//! A [`Timer`] has at most one pending fire. Starting it again cancels the
//! pending fire outright: the old heap entry becomes stale and is skipped
//! when it surfaces, so a rearmed timer can never fire early.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::{LoopHandle, Shared};

/// Delays that overflow `Instant` are clamped to this.
const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Callback invoked when a timer fires.
pub(crate) type TimerCallback = Rc<dyn Fn()>;

#[derive(Default)]
struct TimerSlot {
    generation: u64,
    deadline: Option<Instant>,
    callback: Option<TimerCallback>,
}

/// Heap entry: `(deadline, arm sequence, timer id, generation)`.
type Entry = Reverse<(Instant, u64, u64, u64)>;

/// Deadline-ordered queue of armed timers.
#[derive(Default)]
pub(crate) struct TimerQueue {
    slots: HashMap<u64, TimerSlot>,
    heap: BinaryHeap<Entry>,
    next_id: u64,
    next_seq: u64,
}

impl TimerQueue {
    pub fn insert(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.insert(id, TimerSlot::default());
        id
    }

    pub fn remove(&mut self, id: u64) {
        self.slots.remove(&id);
    }

    pub fn arm(&mut self, id: u64, deadline: Instant, callback: TimerCallback) {
        let Some(slot) = self.slots.get_mut(&id) else {
            return;
        };

        slot.generation += 1;
        slot.deadline = Some(deadline);
        slot.callback = Some(callback);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((deadline, seq, id, slot.generation)));
    }

    /// Cancel a pending fire. Returns the callback so the caller can drop it
    /// outside any borrow.
    pub fn cancel(&mut self, id: u64) -> Option<TimerCallback> {
        let slot = self.slots.get_mut(&id)?;
        slot.generation += 1;
        slot.deadline = None;
        slot.callback.take()
    }

    pub fn deadline(&self, id: u64) -> Option<Instant> {
        self.slots.get(&id).and_then(|s| s.deadline)
    }

    /// Number of timers with a pending fire.
    pub fn pending(&self) -> usize {
        self.slots.values().filter(|s| s.deadline.is_some()).count()
    }

    /// Sequence number the next arm will receive.
    pub const fn watermark(&self) -> u64 {
        self.next_seq
    }

    fn is_live(&self, entry: &Entry) -> bool {
        let Reverse((_, _, id, generation)) = *entry;
        self.slots
            .get(&id)
            .is_some_and(|s| s.generation == generation && s.deadline.is_some())
    }

    fn discard_stale(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.is_live(top) {
                break;
            }
            self.heap.pop();
        }
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_stale();
        self.heap.peek().map(|Reverse((deadline, ..))| *deadline)
    }

    /// Pop the earliest timer due at `now` that was armed before `watermark`.
    ///
    /// Timers armed by a callback during the current pass wait for the next
    /// pass, even with a zero delay.
    pub fn pop_due(&mut self, now: Instant, watermark: u64) -> Option<TimerCallback> {
        self.discard_stale();

        let Reverse((deadline, seq, id, _)) = *self.heap.peek()?;
        if deadline > now || seq >= watermark {
            return None;
        }

        self.heap.pop();
        let slot = self.slots.get_mut(&id)?;
        slot.deadline = None;
        slot.callback.take()
    }
}

/// A single-shot timer bound to an event loop.
///
/// # Example
///
/// ```rust,ignore
/// let timer = Timer::new(&event_loop.handle());
/// timer.start(Duration::from_millis(1000), || println!("fired"));
///
/// // Rearming resets the delay, the first fire never happens
/// timer.start(Duration::from_millis(1000), || println!("fired"));
/// ```
pub struct Timer {
    id: u64,
    shared: Rc<Shared>,
}

impl Timer {
    /// Create an idle timer on the given loop.
    #[must_use]
    pub fn new(handle: &LoopHandle) -> Self {
        let shared = handle.shared().clone();
        let id = shared.timers.borrow_mut().insert();
        Self { id, shared }
    }

    /// Arm the timer to fire once after `delay`, cancelling any pending fire.
    pub fn start<F>(&self, delay: Duration, callback: F)
    where
        F: Fn() + 'static,
    {
        let now = self.shared.clock.now();
        let deadline = now
            .checked_add(delay)
            .or_else(|| now.checked_add(MAX_DELAY));
        let previous = self.shared.timers.borrow_mut().cancel(self.id);
        // Past every representable instant the timer simply never fires.
        if let Some(deadline) = deadline {
            self.shared
                .timers
                .borrow_mut()
                .arm(self.id, deadline, Rc::new(callback));
        }
        drop(previous);
    }

    /// Cancel the pending fire, if any. Safe to call any number of times.
    pub fn stop(&self) {
        let previous = self.shared.timers.borrow_mut().cancel(self.id);
        drop(previous);
    }

    /// Returns `true` while a fire is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline().is_some()
    }

    /// When the pending fire is due.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.shared.timers.borrow().deadline(self.id)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
        self.shared.timers.borrow_mut().remove(self.id);
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("pending", &self.is_pending())
            .finish()
    }
}
