//! Debounced reload of a single configuration file.
//!
//! # Features
//!
//! - **Debouncing** - bursts of change notifications collapse into one reload
//! - **Failure containment** - a candidate that fails `finalize` is logged and
//!   dropped; the listener keeps what it had
//! - **Restart on replace** - on platforms where replacing the file kills the
//!   watch, it is re-registered after every reload attempt
//! - **Publication** - [`ConfigSlot`] shares the accepted configuration with
//!   other threads
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cfgwatch::event_loop::EventLoop;
//! use cfgwatch::file::{FileConfig, FileLoader};
//! use cfgwatch::watch::{ConfigSlot, WatchBuilder};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let event_loop = EventLoop::new();
//! let slot = Arc::new(ConfigSlot::<Settings>::empty());
//!
//! let watcher = WatchBuilder::new("settings.toml")
//!     .debounce(Duration::from_millis(200))
//!     .build(
//!         &event_loop.handle(),
//!         FileConfig::<Settings>::default,
//!         FileLoader::new(),
//!         slot.file_listener(),
//!     )?;
//!
//! event_loop.run();
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │   FsEvent   │────▶│ ConfigWatcher │────▶│ WatcherListener │
//! │ (backend)   │     │  (debounce)   │     │  (ConfigSlot)   │
//! └─────────────┘     └───────┬───────┘     └─────────────────┘
//!                             │ timer fires
//!                             ▼
//!            factory.create() → loader.load_from_file() → finalize()
//! ```
//!
//! # Error Handling
//!
//! Reload failures never leave the watcher: they are logged at error level
//! and the candidate is dropped. The only error a running watcher reports is
//! losing its watch for good, which arrives through
//! [`WatcherListener::on_watch_lost`](crate::WatcherListener::on_watch_lost).

mod builder;
mod container;
mod types;
mod watcher;

pub use builder::WatchBuilder;
pub use container::{ConfigSlot, FileSlotListener, SlotListener};
pub use types::{
    ConfigChange, DEFAULT_DEBOUNCE, DEFAULT_RESTART_BACKOFF, ReloadStats, ReplacePolicy,
    RestartBackoff, WatcherState,
};
pub use watcher::ConfigWatcher;
