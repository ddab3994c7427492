//! Performance benchmarks for the event loop and reload path.
//!
//! Run with: `cargo bench -p cfgwatch`

use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use cfgwatch::event_loop::{EventLoop, ManualBackend, ManualClock, NotificationKind, Timer};
use cfgwatch::watch::{ConfigSlot, ReplacePolicy, WatchBuilder};
use cfgwatch::{FileFormat, FileLoader, Finalize};
use divan::{Bencher, black_box};
use serde::Deserialize;

fn main() {
    divan::main();
}

#[derive(Default)]
struct Tiny(u32);

impl Finalize for Tiny {
    fn finalize(&mut self) -> bool {
        true
    }
}

fn manual_loop() -> (EventLoop, Rc<ManualClock>, Rc<ManualBackend>) {
    let clock = Rc::new(ManualClock::new());
    let backend = Rc::new(ManualBackend::new());
    let event_loop = EventLoop::with_parts(clock.clone(), backend.clone());
    (event_loop, clock, backend)
}

// ============================================================================
// Timers
// ============================================================================

#[divan::bench(args = [1, 10, 100, 1000])]
fn timer_rearm_churn(bencher: Bencher, rearms: usize) {
    bencher.bench_local(|| {
        let (event_loop, clock, _) = manual_loop();
        let timer = Timer::new(&event_loop.handle());

        for _ in 0..rearms {
            timer.start(Duration::from_millis(1000), || {});
            clock.advance(Duration::from_millis(1));
            event_loop.run_pending();
        }

        clock.advance(Duration::from_millis(1000));
        black_box(event_loop.run_pending())
    });
}

// ============================================================================
// Debounced bursts
// ============================================================================

#[divan::bench(args = [1, 10, 100])]
fn notification_burst(bencher: Bencher, burst: usize) {
    bencher.bench_local(|| {
        let (event_loop, clock, backend) = manual_loop();
        let watcher = WatchBuilder::new("cfg.json")
            .replace_policy(ReplacePolicy::Restart)
            .build(
                &event_loop.handle(),
                Tiny::default,
                |cfg: &mut Tiny, _: &Path| cfg.0 += 1,
                |cfg: Tiny| {
                    black_box(cfg.0);
                },
            )
            .unwrap();

        for _ in 0..burst {
            backend.emit("cfg.json", NotificationKind::Modified);
        }
        event_loop.run_pending();
        clock.advance(watcher.debounce());
        event_loop.run_pending();

        black_box(watcher.stats())
    });
}

// ============================================================================
// Parsing and publication
// ============================================================================

#[derive(Deserialize)]
#[allow(dead_code)]
struct Server {
    host: String,
    port: u16,
    workers: u32,
    tags: Vec<String>,
}

const SERVER_JSON: &str = r#"{
    "host": "0.0.0.0",
    "port": 8080,
    "workers": 8,
    "tags": ["a", "b", "c"]
}"#;

#[divan::bench]
fn parse_json() -> Server {
    FileLoader::parse_str(black_box(SERVER_JSON), FileFormat::Json).unwrap()
}

#[divan::bench(threads = [1, 4])]
fn slot_read(bencher: Bencher) {
    let slot = ConfigSlot::new(42u64);
    bencher.bench(|| slot.read(|v| *v));
}

#[divan::bench]
fn slot_publish(bencher: Bencher) {
    let slot = ConfigSlot::new(0u64);
    let mut next = 0;
    bencher.bench_local(|| {
        next += 1;
        black_box(slot.publish(next).epoch)
    });
}
