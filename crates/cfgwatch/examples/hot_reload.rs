//! Hot reload example.
//!
//! Watches a JSON file in the temp directory and prints every configuration
//! that passes validation.
//!
//! # Running
//!
//! ```bash
//! cargo run --example hot_reload
//!
//! # In another terminal, modify the config
//! echo '{ "port": 9090, "host": "localhost", "debug": true }' > /tmp/cfgwatch_example.json
//!
//! # An invalid file is reported and ignored
//! echo '{ "port": 0 }' > /tmp/cfgwatch_example.json
//! ```
//!
//! The example stops on its own after a minute.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cfgwatch::event_loop::EventLoop;
use cfgwatch::watch::{ConfigSlot, WatchBuilder};
use cfgwatch::{FileConfig, FileLoader, Finalize};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Config {
    port: u16,
    #[serde(default)]
    host: String,
    #[serde(default)]
    debug: bool,
}

impl Finalize for Config {
    fn finalize(&mut self) -> bool {
        if self.host.is_empty() {
            self.host = "localhost".to_string();
        }
        self.port != 0
    }
}

fn main() -> miette::Result<()> {
    let config_path = std::env::temp_dir().join("cfgwatch_example.json");
    fs::write(
        &config_path,
        r#"{ "port": 8080, "host": "localhost", "debug": false }"#,
    )
    .map_err(|e| miette::miette!("failed to write {}: {e}", config_path.display()))?;

    println!("Config file: {}", config_path.display());
    println!("Modify this file to see hot reload in action!\n");

    let event_loop = EventLoop::new();
    let slot = Arc::new(ConfigSlot::<Config>::empty());

    slot.subscribe(|change| {
        println!("\n[RELOAD] Configuration changed (epoch {})", change.epoch);
        if let Some(previous) = &change.previous {
            println!("  Previous: {previous:?}");
        }
        println!("  Current:  {:?}", change.current);
    });

    let watcher = WatchBuilder::new(&config_path)
        .debounce(Duration::from_millis(200))
        .build(
            &event_loop.handle(),
            FileConfig::<Config>::default,
            FileLoader::new(),
            slot.file_listener(),
        )?;

    // Readers on other threads only ever see accepted configurations.
    let reader = slot.clone();
    thread::spawn(move || {
        loop {
            thread::sleep(Duration::from_secs(5));
            match reader.get() {
                Some(cfg) => println!("[reader] serving on {}:{}", cfg.host, cfg.port),
                None => println!("[reader] still on the built-in defaults"),
            }
        }
    });

    let remote = event_loop.remote();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(60));
        let _ = remote.stop();
    });

    event_loop.run();

    println!("\nStopping after {} reload attempt(s)", watcher.stats().attempts);
    watcher.stop();

    Ok(())
}
