//! Property-based tests for reload invariants.
//!
//! These drive a watcher on a manual clock with arbitrary notification
//! schedules and check the debounce contract holds for all of them.

#![allow(clippy::pedantic)]

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use cfgwatch::event_loop::{EventLoop, ManualBackend, ManualClock, NotificationKind};
use cfgwatch::watch::{ReplacePolicy, RestartBackoff, WatchBuilder};
use cfgwatch::{ConfigWatcher, Finalize};
use proptest::prelude::*;

const PATH: &str = "cfg.json";

#[derive(Default)]
struct Snapshot {
    version: u32,
    valid: bool,
}

impl Finalize for Snapshot {
    fn finalize(&mut self) -> bool {
        self.valid
    }
}

struct Rig {
    event_loop: EventLoop,
    clock: Rc<ManualClock>,
    backend: Rc<ManualBackend>,
    version: Rc<Cell<(u32, bool)>>,
    received: Rc<RefCell<Vec<(u32, Duration)>>>,
    _watcher: ConfigWatcher<Snapshot>,
}

fn rig(debounce: Duration, policy: ReplacePolicy) -> Rig {
    let clock = Rc::new(ManualClock::new());
    let backend = Rc::new(ManualBackend::new());
    let event_loop = EventLoop::with_parts(clock.clone(), backend.clone());

    let version = Rc::new(Cell::new((0, true)));
    let received = Rc::new(RefCell::new(Vec::new()));

    let file = version.clone();
    let sink = received.clone();
    let at = clock.clone();

    let watcher = WatchBuilder::new(PATH)
        .debounce(debounce)
        .replace_policy(policy)
        .build(
            &event_loop.handle(),
            Snapshot::default,
            move |cfg: &mut Snapshot, _: &Path| {
                let (v, valid) = file.get();
                cfg.version = v;
                cfg.valid = valid;
            },
            move |cfg: Snapshot| sink.borrow_mut().push((cfg.version, at.elapsed())),
        )
        .unwrap();

    Rig {
        event_loop,
        clock,
        backend,
        version,
        received,
        _watcher: watcher,
    }
}

fn policy() -> impl Strategy<Value = ReplacePolicy> {
    prop_oneof![Just(ReplacePolicy::Survives), Just(ReplacePolicy::Restart)]
}

// ============================================================================
// Debounce Properties
// ============================================================================

mod debounce_properties {
    use super::*;

    proptest! {
        /// A burst with every gap below the delay yields exactly one reload,
        /// reading the state written by the last notification, at
        /// last-notification time plus the delay.
        #[test]
        fn burst_collapses_to_one_reload(
            delay_ms in 10u64..2000,
            gaps in prop::collection::vec(0u64..1000, 0..30),
            policy in policy(),
        ) {
            let delay = Duration::from_millis(delay_ms);
            let r = rig(delay, policy);

            let mut version = 1;
            r.version.set((version, true));
            r.backend.emit(PATH, NotificationKind::Modified);
            r.event_loop.run_pending();

            for gap in gaps {
                let gap = Duration::from_millis(gap % delay_ms);
                r.clock.advance(gap);
                r.event_loop.run_pending();

                version += 1;
                r.version.set((version, true));
                r.backend.emit(PATH, NotificationKind::Modified);
                r.event_loop.run_pending();
            }
            let last_event = r.clock.elapsed();

            prop_assert!(r.received.borrow().is_empty());

            r.event_loop.run();

            let received = r.received.borrow();
            prop_assert_eq!(received.len(), 1);
            prop_assert_eq!(received[0].0, version);
            prop_assert_eq!(received[0].1, last_event + delay);
        }

        /// Bursts separated by more than the delay each produce one reload.
        #[test]
        fn separated_bursts_reload_separately(
            bursts in 1usize..8,
            policy in policy(),
        ) {
            let delay = Duration::from_millis(100);
            let r = rig(delay, policy);

            for version in 0..bursts {
                r.version.set((version as u32, true));
                r.backend.emit(PATH, NotificationKind::Modified);
                r.event_loop.run_pending();
                r.clock.advance(delay * 2);
                r.event_loop.run_pending();
            }

            let versions: Vec<u32> = r.received.borrow().iter().map(|(v, _)| *v).collect();
            let expected: Vec<u32> = (0..bursts as u32).collect();
            prop_assert_eq!(versions, expected);
        }

        /// Invalid candidates never reach the listener, however they interleave
        /// with valid ones, and the last accepted one is the last valid write.
        #[test]
        fn only_valid_candidates_are_handed_off(
            writes in prop::collection::vec(prop::bool::ANY, 1..20),
        ) {
            let delay = Duration::from_millis(50);
            let r = rig(delay, ReplacePolicy::Restart);

            for (i, valid) in writes.iter().enumerate() {
                r.version.set((i as u32, *valid));
                r.backend.emit(PATH, NotificationKind::Modified);
                r.event_loop.run_pending();
                r.clock.advance(delay);
                r.event_loop.run_pending();
            }

            let received = r.received.borrow();
            let expected: Vec<u32> = writes
                .iter()
                .enumerate()
                .filter(|(_, valid)| **valid)
                .map(|(i, _)| i as u32)
                .collect();
            let versions: Vec<u32> = received.iter().map(|(v, _)| *v).collect();
            prop_assert_eq!(versions, expected);
        }
    }
}

// ============================================================================
// Backoff Properties
// ============================================================================

mod backoff_properties {
    use super::*;

    proptest! {
        /// Delays never shrink from one attempt to the next.
        #[test]
        fn delays_are_monotonic(
            initial_ms in 0u64..10_000,
            factor in 0u32..10,
            attempt in 1u32..64,
        ) {
            let backoff = RestartBackoff {
                initial: Duration::from_millis(initial_ms),
                factor,
                max_attempts: u32::MAX,
            };
            prop_assert!(backoff.delay_after(attempt) <= backoff.delay_after(attempt + 1));
            prop_assert!(backoff.delay_after(attempt) >= backoff.initial);
        }
    }
}
