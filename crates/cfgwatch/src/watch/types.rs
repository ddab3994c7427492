//! Core types for the reload watcher.
//!
//! - [`WatcherState`] - where a watcher is in its lifecycle
//! - [`ReplacePolicy`] - whether the platform watch survives file replacement
//! - [`RestartBackoff`] - how re-registration failures are retried
//! - [`ReloadStats`] - counters for notifications and reload attempts
//! - [`ConfigChange`] - a published configuration swap

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Delay between the last change notification and the reload it triggers.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Retry schedule used when the watch cannot be re-armed after a reload.
pub const DEFAULT_RESTART_BACKOFF: RestartBackoff = RestartBackoff {
    initial: Duration::from_millis(100),
    factor: 2,
    max_attempts: 5,
};

/// Lifecycle state of a [`ConfigWatcher`](super::ConfigWatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum WatcherState {
    /// Watching, no reload pending.
    Idle,

    /// A change was seen and the debounce timer is armed.
    PendingReload,

    /// The watch could not be re-armed and a retry is scheduled.
    Restarting {
        /// The attempt that failed most recently.
        attempt: u32,
    },

    /// Stopped by the owner. Terminal.
    Stopped,

    /// The watch was lost for good. Terminal.
    Failed,
}

impl WatcherState {
    /// Returns `true` for states no event can leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),

            Self::PendingReload => f.write_str("pending reload"),

            Self::Restarting { attempt } => write!(f, "restarting (attempt {attempt} failed)"),

            Self::Stopped => f.write_str("stopped"),

            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Whether the platform's watch keeps working after the file is replaced.
///
/// Editors often save by writing a temporary file and renaming it over the
/// original. Inotify and kqueue watches follow the old inode and go quiet
/// afterwards, so the watch has to be re-registered after each reload.
/// Windows change notifications are tied to the name and survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// The watch survives replacement; never re-register.
    Survives,

    /// Re-register the watch after every reload attempt.
    Restart,
}

impl ReplacePolicy {
    /// The policy for the platform this binary runs on.
    #[must_use]
    pub const fn detect() -> Self {
        if cfg!(windows) {
            Self::Survives
        } else {
            Self::Restart
        }
    }

    /// Returns `true` if the watch must be re-registered after a reload.
    #[must_use]
    pub const fn needs_restart(self) -> bool {
        matches!(self, Self::Restart)
    }
}

impl Default for ReplacePolicy {
    fn default() -> Self {
        Self::detect()
    }
}

/// Exponential retry schedule for re-arming a lost watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartBackoff {
    /// Delay before the second attempt.
    pub initial: Duration,

    /// Multiplier applied per failed attempt.
    pub factor: u32,

    /// Attempts before the watcher gives up, including the immediate one.
    pub max_attempts: u32,
}

impl RestartBackoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.factor.max(1).saturating_pow(exponent);
        self.initial.saturating_mul(multiplier)
    }
}

impl Default for RestartBackoff {
    fn default() -> Self {
        DEFAULT_RESTART_BACKOFF
    }
}

/// Counters describing what a watcher has done so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReloadStats {
    /// Notifications received from the backend.
    pub notifications: u64,

    /// Notifications dropped without arming the timer.
    pub ignored: u64,

    /// Reload attempts (timer fires).
    pub attempts: u64,

    /// Attempts handed to the listener.
    pub accepted: u64,

    /// Attempts dropped by finalize.
    pub rejected: u64,

    /// Successful watch re-registrations.
    pub restarts: u64,
}

/// A configuration swap published by a
/// [`ConfigSlot`](super::ConfigSlot).
#[derive(Debug)]
pub struct ConfigChange<T> {
    /// Configuration that was active before, or `None` for the first publish.
    pub previous: Option<Arc<T>>,

    /// Configuration that is active now.
    pub current: Arc<T>,

    /// Slot epoch after the swap.
    pub epoch: u64,

    /// When the swap happened.
    pub timestamp: Instant,
}

impl<T> ConfigChange<T> {
    /// Create a change event stamped with the current time.
    pub fn new(previous: Option<Arc<T>>, current: Arc<T>, epoch: u64) -> Self {
        Self {
            previous,
            current,
            epoch,
            timestamp: Instant::now(),
        }
    }

    /// Returns `true` if nothing was active before this change.
    #[must_use]
    pub const fn is_initial(&self) -> bool {
        self.previous.is_none()
    }
}

impl<T> Clone for ConfigChange<T> {
    fn clone(&self) -> Self {
        Self {
            previous: self.previous.clone(),
            current: self.current.clone(),
            epoch: self.epoch,
            timestamp: self.timestamp,
        }
    }
}
