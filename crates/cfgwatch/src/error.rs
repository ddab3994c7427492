//! Error types for watching and reloading.
//!
//! Every failure that can leave the watcher is reported through [`WatchError`],
//! which integrates with [`miette`] for rich terminal diagnostics.
//!
//! | Variant | When It Occurs |
//! |---------|----------------|
//! | [`WatchError::InitFailed`] | The watcher or backend could not be set up |
//! | [`WatchError::PathError`] | The watch target could not be registered |
//! | [`WatchError::RestartFailed`] | Re-registration after a reload kept failing |
//! | [`WatchError::Stopped`] | An operation was attempted on a stopped watcher |
//! | [`WatchError::ChannelError`] | The event loop's queue was disconnected |
//!
//! Reload failures are deliberately absent: a configuration that fails to
//! load or finalize is logged and dropped, never surfaced as an error value.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error type for watch operations.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize the watcher or its backend.
    #[error("failed to initialize file watcher: {message}")]
    #[diagnostic(
        code(cfgwatch::watch::init_failed),
        help("Check that the watch target is a non-empty path and the platform supports file notifications")
    )]
    InitFailed {
        /// Human-readable error message.
        message: String,
        /// The underlying notify error, if available.
        #[source]
        source: Option<notify::Error>,
    },

    /// Failed to register a watch on a specific path.
    #[error("failed to watch path '{path}': {message}")]
    #[diagnostic(
        code(cfgwatch::watch::path_error),
        help("Ensure the path exists and you have read permissions")
    )]
    PathError {
        /// The path that could not be watched.
        path: PathBuf,
        /// Human-readable error message.
        message: String,
    },

    /// The watch could not be re-registered after a reload.
    ///
    /// The watcher is terminal after this error: no further change
    /// notifications will be observed.
    #[error("failed to re-arm watch on '{path}' after {attempts} attempt(s)")]
    #[diagnostic(
        code(cfgwatch::watch::restart_failed),
        help(
            "The file was probably removed or replaced by something unreadable. Restore it and create a new watcher."
        )
    )]
    RestartFailed {
        /// The watched path.
        path: PathBuf,
        /// How many registrations were tried.
        attempts: u32,
        /// The last registration error.
        #[source]
        source: Box<WatchError>,
    },

    /// The watcher has been stopped.
    #[error("watcher has been stopped")]
    #[diagnostic(
        code(cfgwatch::watch::stopped),
        help("Create a new watcher if you need to continue watching for changes")
    )]
    Stopped,

    /// Channel communication error.
    #[error("internal channel error: {message}")]
    #[diagnostic(code(cfgwatch::watch::channel_error))]
    ChannelError {
        /// Human-readable error message.
        message: String,
    },
}

impl WatchError {
    /// Create a new `InitFailed` error.
    pub fn init_failed(message: impl Into<String>, source: Option<notify::Error>) -> Self {
        Self::InitFailed {
            message: message.into(),
            source,
        }
    }

    /// Create a new `PathError`.
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PathError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new `RestartFailed` error wrapping the last registration error.
    pub fn restart_failed(path: impl Into<PathBuf>, attempts: u32, last: Self) -> Self {
        Self::RestartFailed {
            path: path.into(),
            attempts,
            source: Box::new(last),
        }
    }

    /// Create a new `ChannelError`.
    pub fn channel_error(message: impl Into<String>) -> Self {
        Self::ChannelError {
            message: message.into(),
        }
    }

    /// Returns `true` if the watcher can no longer observe changes.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::RestartFailed { .. } | Self::Stopped)
    }
}
