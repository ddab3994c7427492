//! Single-threaded event loop driving timers and filesystem watches.
//!
//! The loop is explicit: the host creates it, hands [`LoopHandle`]s to the
//! components that need one, and drives it from a single thread. Nothing in
//! this crate reaches for a process-wide default loop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  NotificationSink  ┌──────────────┐
//! │ WatchBackend│───────────────────▶│   channel    │
//! │  (notify)   │   (any thread)     │ LoopMessage  │
//! └─────────────┘                    └──────┬───────┘
//!                                           │ run_pending()
//!                         ┌─────────────────┼─────────────────┐
//!                         ▼                                   ▼
//!                  ┌─────────────┐                     ┌─────────────┐
//!                  │   FsEvent   │                     │ TimerQueue  │
//!                  │  callbacks  │                     │  (due fires)│
//!                  └─────────────┘                     └─────────────┘
//! ```
//!
//! Each pass first dispatches the notifications queued when the pass began,
//! in arrival order, then fires every timer that is due. Callbacks run
//! without any loop state borrowed, so they may freely start or stop other
//! handles.
//!
//! # Deterministic driving
//!
//! With a [`ManualClock`] and a [`ManualBackend`] the loop never sleeps and
//! never touches the filesystem:
//!
//! ```rust,ignore
//! let clock = Rc::new(ManualClock::new());
//! let backend = Rc::new(ManualBackend::new());
//! let event_loop = EventLoop::with_parts(clock.clone(), backend.clone());
//!
//! backend.emit("cfg.json", NotificationKind::Modified);
//! event_loop.run_pending();
//! clock.advance(Duration::from_millis(1000));
//! event_loop.run_pending();
//! ```

mod backend;
mod clock;
mod fs_event;
mod timer;

pub use backend::{
    FsNotification, ManualBackend, NotificationKind, NotificationSink, NotifyBackend,
    WatchBackend, WatchGuard,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fs_event::FsEvent;
pub use timer::Timer;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use self::fs_event::SourceSlot;
use self::timer::TimerQueue;
use crate::error::WatchError;

/// Messages queued for the loop thread.
#[derive(Debug)]
pub(crate) enum LoopMessage {
    /// A notification for a watch registration.
    Fs {
        source: u64,
        generation: u64,
        notification: FsNotification,
    },
    /// Interrupt a blocking turn.
    Wake,
    /// Stop [`EventLoop::run`].
    Stop,
}

/// State shared by the loop and every handle bound to it.
pub(crate) struct Shared {
    pub clock: Rc<dyn Clock>,
    pub backend: Rc<dyn WatchBackend>,
    pub timers: RefCell<TimerQueue>,
    pub sources: RefCell<HashMap<u64, SourceSlot>>,
    pub tx: Sender<LoopMessage>,
    rx: Receiver<LoopMessage>,
    next_source: Cell<u64>,
    stop_requested: Cell<bool>,
}

impl Shared {
    pub fn next_source_id(&self) -> u64 {
        let id = self.next_source.get();
        self.next_source.set(id + 1);
        id
    }

    fn active_sources(&self) -> usize {
        self.sources
            .borrow()
            .values()
            .filter(|slot| slot.guard.is_some())
            .count()
    }

    /// Run the callback a message targets. Returns `true` if one ran.
    fn dispatch(&self, message: LoopMessage) -> bool {
        match message {
            LoopMessage::Fs {
                source,
                generation,
                notification,
            } => {
                let callback = self
                    .sources
                    .borrow()
                    .get(&source)
                    .and_then(|slot| slot.callback_for(generation));

                callback.is_some_and(|cb| {
                    cb(notification);
                    true
                })
            }
            LoopMessage::Wake => false,
            LoopMessage::Stop => {
                self.stop_requested.set(true);
                false
            }
        }
    }

    fn run_pending(&self) -> usize {
        let mut executed = 0;

        let queued = self.rx.len();
        for _ in 0..queued {
            match self.rx.try_recv() {
                Ok(message) => executed += usize::from(self.dispatch(message)),
                Err(_) => break,
            }
        }

        let now = self.clock.now();
        let watermark = self.timers.borrow().watermark();
        loop {
            let due = self.timers.borrow_mut().pop_due(now, watermark);
            match due {
                Some(callback) => {
                    callback();
                    executed += 1;
                }
                None => break,
            }
        }

        executed
    }
}

/// Cheap, clonable reference to an [`EventLoop`].
///
/// Handles are confined to the loop thread. Use [`Remote`] to reach the loop
/// from elsewhere.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Rc<Shared>,
}

impl LoopHandle {
    pub(crate) const fn shared(&self) -> &Rc<Shared> {
        &self.shared
    }

    /// The loop's current time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.shared.clock.now()
    }

    /// Make the current [`EventLoop::run`] return after this pass.
    pub fn stop(&self) {
        self.shared.stop_requested.set(true);
    }

    /// A thread-safe handle to the same loop.
    #[must_use]
    pub fn remote(&self) -> Remote {
        Remote {
            tx: self.shared.tx.clone(),
        }
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle").finish_non_exhaustive()
    }
}

/// Thread-safe control handle for an [`EventLoop`].
#[derive(Clone, Debug)]
pub struct Remote {
    tx: Sender<LoopMessage>,
}

impl Remote {
    /// Stop the loop's [`run`](EventLoop::run).
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::ChannelError`] if the loop no longer exists.
    pub fn stop(&self) -> Result<(), WatchError> {
        self.tx
            .send(LoopMessage::Stop)
            .map_err(|_| WatchError::channel_error("failed to send stop command"))
    }

    /// Interrupt a blocking turn without doing anything else.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::ChannelError`] if the loop no longer exists.
    pub fn wake(&self) -> Result<(), WatchError> {
        self.tx
            .send(LoopMessage::Wake)
            .map_err(|_| WatchError::channel_error("failed to send wake command"))
    }
}

/// A single-threaded reactor for timers and filesystem watches.
pub struct EventLoop {
    handle: LoopHandle,
}

impl EventLoop {
    /// Create a loop on the system clock with the `notify` backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(Rc::new(SystemClock), Rc::new(NotifyBackend))
    }

    /// Create a loop with an explicit clock and watch backend.
    #[must_use]
    pub fn with_parts(clock: Rc<dyn Clock>, backend: Rc<dyn WatchBackend>) -> Self {
        let (tx, rx) = unbounded();

        let shared = Shared {
            clock,
            backend,
            timers: RefCell::new(TimerQueue::default()),
            sources: RefCell::new(HashMap::new()),
            tx,
            rx,
            next_source: Cell::new(0),
            stop_requested: Cell::new(false),
        };

        Self {
            handle: LoopHandle {
                shared: Rc::new(shared),
            },
        }
    }

    /// A handle for registering timers and watches on this loop.
    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// A thread-safe control handle.
    #[must_use]
    pub fn remote(&self) -> Remote {
        self.handle.remote()
    }

    /// The loop's current time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.handle.now()
    }

    /// Dispatch queued notifications, then fire due timers, without waiting.
    ///
    /// Returns the number of callbacks executed.
    pub fn run_pending(&self) -> usize {
        self.handle.shared.run_pending()
    }

    /// Earliest pending timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.handle.shared.timers.borrow_mut().next_deadline()
    }

    /// Returns `true` while any timer is pending or any watch is active.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        let shared = &self.handle.shared;
        shared.timers.borrow().pending() > 0 || shared.active_sources() > 0
    }

    /// Run one pass, waiting up to `max_wait` (or until the next timer
    /// deadline) for something to do first.
    ///
    /// On a manual clock the wait advances the clock instead of sleeping.
    /// Returns the number of callbacks executed.
    pub fn turn(&self, max_wait: Option<Duration>) -> usize {
        let shared = &self.handle.shared;

        let executed = shared.run_pending();
        if executed > 0 || shared.stop_requested.get() {
            return executed;
        }

        let now = shared.clock.now();
        let limit = max_wait.and_then(|wait| now.checked_add(wait));
        let wake_at = match (self.next_deadline(), limit) {
            (Some(deadline), Some(limit)) => Some(deadline.min(limit)),
            (deadline, limit) => deadline.or(limit),
        };

        if shared.clock.is_manual() {
            if let Some(instant) = wake_at {
                shared.clock.advance_to(instant);
            }
            return shared.run_pending();
        }

        let received = match wake_at {
            Some(instant) => {
                let wait = instant.saturating_duration_since(now);
                match shared.rx.recv_timeout(wait) {
                    Ok(message) => Some(message),
                    Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
                }
            }
            None => shared.rx.recv().ok(),
        };

        let mut executed = 0;
        if let Some(message) = received {
            executed += usize::from(shared.dispatch(message));
        }
        executed + shared.run_pending()
    }

    /// Drive the loop until it is stopped or has nothing left to wait for.
    ///
    /// Returns early on a manual clock once a pass does nothing, since no
    /// progress is possible without outside input.
    pub fn run(&self) {
        let shared = &self.handle.shared;

        while !shared.stop_requested.get() {
            if !self.is_alive() && shared.rx.is_empty() {
                break;
            }

            let executed = self.turn(None);
            if executed == 0 && shared.clock.is_manual() {
                break;
            }
        }

        shared.stop_requested.set(false);
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = &self.handle.shared;
        f.debug_struct("EventLoop")
            .field("pending_timers", &shared.timers.borrow().pending())
            .field("active_watches", &shared.active_sources())
            .field("queued", &shared.rx.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn manual_loop() -> (EventLoop, Rc<ManualClock>, Rc<ManualBackend>) {
        let clock = Rc::new(ManualClock::new());
        let backend = Rc::new(ManualBackend::new());
        let event_loop = EventLoop::with_parts(clock.clone(), backend.clone());
        (event_loop, clock, backend)
    }

    #[test]
    fn test_timer_fires_once_at_deadline() {
        let (event_loop, clock, _) = manual_loop();
        let fired = Rc::new(Cell::new(0));

        let timer = Timer::new(&event_loop.handle());
        let f = fired.clone();
        timer.start(Duration::from_millis(100), move || f.set(f.get() + 1));

        clock.advance(Duration::from_millis(99));
        assert_eq!(event_loop.run_pending(), 0);
        assert!(timer.is_pending());

        clock.advance(Duration::from_millis(1));
        assert_eq!(event_loop.run_pending(), 1);
        assert_eq!(fired.get(), 1);
        assert!(!timer.is_pending());

        clock.advance(Duration::from_secs(10));
        assert_eq!(event_loop.run_pending(), 0);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_timer_with_overflowing_delay_stays_pending() {
        let (event_loop, clock, _) = manual_loop();
        let fired = Rc::new(Cell::new(0));

        let timer = Timer::new(&event_loop.handle());
        let f = fired.clone();
        timer.start(Duration::MAX, move || f.set(f.get() + 1));
        assert!(timer.is_pending());

        clock.advance(Duration::from_secs(3600));
        assert_eq!(event_loop.run_pending(), 0);
        assert_eq!(fired.get(), 0);

        timer.start(Duration::from_millis(10), {
            let f = fired.clone();
            move || f.set(f.get() + 1)
        });
        clock.advance(Duration::from_millis(10));
        assert_eq!(event_loop.run_pending(), 1);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_rearm_resets_delay() {
        let (event_loop, clock, _) = manual_loop();
        let fired = Rc::new(Cell::new(0));
        let timer = Timer::new(&event_loop.handle());

        let f = fired.clone();
        timer.start(Duration::from_millis(100), move || f.set(f.get() + 1));
        clock.advance(Duration::from_millis(80));

        let f = fired.clone();
        timer.start(Duration::from_millis(100), move || f.set(f.get() + 1));
        clock.advance(Duration::from_millis(80));
        event_loop.run_pending();
        assert_eq!(fired.get(), 0);

        clock.advance(Duration::from_millis(20));
        event_loop.run_pending();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_dropped_timer_never_fires() {
        let (event_loop, clock, _) = manual_loop();
        let fired = Rc::new(Cell::new(false));

        let timer = Timer::new(&event_loop.handle());
        let f = fired.clone();
        timer.start(Duration::ZERO, move || f.set(true));
        drop(timer);

        clock.advance(Duration::from_millis(1));
        event_loop.run_pending();
        assert!(!fired.get());
        assert!(!event_loop.is_alive());
    }

    #[test]
    fn test_fs_event_delivers_in_order() {
        let (event_loop, _, backend) = manual_loop();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let watch = FsEvent::new(&event_loop.handle());
        let s = seen.clone();
        watch
            .start("cfg.json", move |n| s.borrow_mut().push(n.kind))
            .unwrap();
        assert!(watch.is_active());

        backend.emit("cfg.json", NotificationKind::Modified);
        backend.emit("cfg.json", NotificationKind::Renamed);
        assert_eq!(event_loop.run_pending(), 2);

        assert_eq!(
            *seen.borrow(),
            vec![NotificationKind::Modified, NotificationKind::Renamed]
        );
    }

    #[test]
    fn test_stop_discards_queued_notifications() {
        let (event_loop, _, backend) = manual_loop();
        let seen = Rc::new(Cell::new(0));

        let watch = FsEvent::new(&event_loop.handle());
        let s = seen.clone();
        watch
            .start("cfg.json", move |_| s.set(s.get() + 1))
            .unwrap();

        backend.emit("cfg.json", NotificationKind::Modified);
        watch.stop();
        watch.stop();

        assert_eq!(event_loop.run_pending(), 0);
        assert_eq!(seen.get(), 0);
        assert!(!watch.is_active());
        assert!(matches!(watch.restart(), Err(WatchError::Stopped)));
    }

    #[test]
    fn test_restart_ignores_old_registration() {
        let (event_loop, _, backend) = manual_loop();
        let seen = Rc::new(Cell::new(0));

        let watch = FsEvent::new(&event_loop.handle());
        let s = seen.clone();
        watch
            .start("cfg.json", move |_| s.set(s.get() + 1))
            .unwrap();

        backend.emit("cfg.json", NotificationKind::Modified);
        watch.restart().unwrap();
        assert_eq!(backend.active("cfg.json"), 1);
        assert_eq!(watch.path().as_deref(), Some(Path::new("cfg.json")));

        event_loop.run_pending();
        assert_eq!(seen.get(), 0);

        backend.emit("cfg.json", NotificationKind::Modified);
        event_loop.run_pending();
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_failed_start_keeps_handle_restartable() {
        let (event_loop, _, backend) = manual_loop();
        let watch = FsEvent::new(&event_loop.handle());

        backend.fail_next_registrations(1);
        assert!(watch.start("cfg.json", |_| {}).is_err());
        assert!(!watch.is_active());

        watch.restart().unwrap();
        assert!(watch.is_active());
    }

    #[test]
    fn test_turn_advances_manual_clock_to_deadline() {
        let (event_loop, clock, _) = manual_loop();
        let timer = Timer::new(&event_loop.handle());
        timer.start(Duration::from_millis(1000), || {});

        assert_eq!(event_loop.turn(None), 1);
        assert_eq!(clock.elapsed(), Duration::from_millis(1000));
    }

    #[test]
    fn test_turn_respects_max_wait() {
        let (event_loop, clock, _) = manual_loop();
        let timer = Timer::new(&event_loop.handle());
        timer.start(Duration::from_millis(1000), || {});

        assert_eq!(event_loop.turn(Some(Duration::from_millis(300))), 0);
        assert_eq!(clock.elapsed(), Duration::from_millis(300));
        assert!(timer.is_pending());
    }

    #[test]
    fn test_callback_can_rearm_its_own_timer() {
        let (event_loop, clock, _) = manual_loop();
        let timer = Rc::new(Timer::new(&event_loop.handle()));
        let fired = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&timer);
        let f = fired.clone();
        timer.start(Duration::ZERO, move || {
            f.set(f.get() + 1);
            if let Some(timer) = weak.upgrade() {
                timer.start(Duration::ZERO, || {});
            }
        });

        assert_eq!(event_loop.run_pending(), 1);
        assert_eq!(fired.get(), 1);
        assert!(timer.is_pending());

        clock.advance(Duration::from_millis(1));
        assert_eq!(event_loop.run_pending(), 1);
    }

    #[test]
    fn test_remote_stop_ends_run() {
        let (event_loop, _, _) = manual_loop();
        let _timer = Timer::new(&event_loop.handle());
        let watch = FsEvent::new(&event_loop.handle());
        watch.start("cfg.json", |_| {}).unwrap();

        event_loop.remote().stop().unwrap();
        event_loop.run();
        assert!(event_loop.is_alive());
    }
}
