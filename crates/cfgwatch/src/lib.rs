//! # cfgwatch
//!
//! Hot reload for a single configuration file.
//!
//! `cfgwatch` watches one file, waits for a burst of changes to settle, and
//! then builds a fresh configuration from it. A configuration that fails to
//! validate is logged and thrown away, so the running program always keeps the
//! last configuration that was good.
//!
//! ## Features
//!
//! - **Debounced reloads** - editors that write a file in several steps cause
//!   a single reload, reading the final contents
//! - **Failure containment** - invalid candidates never reach the listener
//! - **Restart on replace** - watches that die when a file is renamed over
//!   are re-registered, with backoff when that fails
//! - **Deterministic testing** - the event loop takes an injectable clock and
//!   watch backend
//! - **Rich diagnostics** - file errors render through [`miette`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cfgwatch::event_loop::EventLoop;
//! use cfgwatch::file::{FileConfig, FileLoader};
//! use cfgwatch::watch::{ConfigSlot, ConfigWatcher};
//! use cfgwatch::Finalize;
//! use std::sync::Arc;
//!
//! #[derive(serde::Deserialize)]
//! struct Settings {
//!     port: u16,
//! }
//!
//! impl Finalize for Settings {
//!     fn finalize(&mut self) -> bool {
//!         self.port != 0
//!     }
//! }
//!
//! fn main() -> miette::Result<()> {
//!     let event_loop = EventLoop::new();
//!     let slot = Arc::new(ConfigSlot::<Settings>::empty());
//!
//!     let _watcher = ConfigWatcher::new(
//!         &event_loop.handle(),
//!         "settings.json",
//!         FileConfig::<Settings>::default,
//!         FileLoader::new(),
//!         slot.file_listener(),
//!     )?;
//!
//!     event_loop.run();
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`event_loop`] - the single-threaded loop, timers and filesystem watches
//! - [`watch`] - the reload watcher, its builder and the shared config slot
//! - [`file`] - ready-made factory and loader for serde types
//!
//! ## Error Handling
//!
//! Setup errors are reported through [`WatchError`], which integrates with
//! [`miette`] for terminal diagnostics:
//!
//! ```rust,ignore
//! if let Err(e) = ConfigWatcher::new(&handle, path, factory, loader, listener) {
//!     eprintln!("{:?}", miette::Report::from(e));
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Re-export miette for error handling.
/// Users can use `cfgwatch::miette` instead of adding miette as a dependency.
pub use miette;

/// Re-export serde so `FileConfig` users can derive `Deserialize`.
pub use serde;

/// Re-export toml when the feature is enabled.
#[cfg(feature = "toml")]
pub use toml;

/// Re-export serde-saphyr (yaml) when the feature is enabled.
#[cfg(feature = "yaml")]
pub use serde_saphyr as yaml;

// ============================================================================
// Core Modules
// ============================================================================

mod config;
pub use config::{
    ConfigFactory, ConfigLoader, Finalize, RejectReason, ReloadOutcome, WatcherListener,
};

mod error;
pub use error::WatchError;

pub mod event_loop;
pub use event_loop::{EventLoop, LoopHandle, Remote};

// ============================================================================
// Watcher
// ============================================================================

pub mod watch;
pub use watch::{ConfigSlot, ConfigWatcher, DEFAULT_DEBOUNCE, WatchBuilder, WatcherState};

// ============================================================================
// File-backed Configuration
// ============================================================================

pub mod file;
pub use file::{FileConfig, FileError, FileFormat, FileLoader};
