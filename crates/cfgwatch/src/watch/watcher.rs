//! The reload watcher.
//!
//! [`ConfigWatcher`] owns one filesystem watch and two timers on an
//! [`EventLoop`](crate::event_loop::EventLoop):
//!
//! - the debounce timer, rearmed by every change notification
//! - the restart timer, used only while a lost watch is being re-armed
//!
//! All callbacks hold a `Weak` reference to the watcher, so dropping the
//! watcher is enough to silence it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use super::types::{ReloadStats, ReplacePolicy, RestartBackoff, WatcherState};
use crate::config::{ConfigFactory, ConfigLoader, Finalize, ReloadOutcome, WatcherListener};
use crate::error::WatchError;
use crate::event_loop::{FsEvent, FsNotification, LoopHandle, Timer};

/// Options for the watcher, set through [`WatchBuilder`](super::WatchBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WatcherOptions {
    /// Delay after the last notification before reloading.
    pub debounce: Duration,
    /// Whether the watch is re-registered after each reload.
    pub replace_policy: ReplacePolicy,
    /// Retry schedule for re-registration.
    pub restart_backoff: RestartBackoff,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce: super::DEFAULT_DEBOUNCE,
            replace_policy: ReplacePolicy::detect(),
            restart_backoff: RestartBackoff::default(),
        }
    }
}

struct Core<C> {
    path: PathBuf,
    options: WatcherOptions,
    factory: Box<dyn ConfigFactory<C>>,
    loader: Box<dyn ConfigLoader<C>>,
    listener: RefCell<Box<dyn WatcherListener<C>>>,
    debounce_timer: Timer,
    restart_timer: Timer,
    fs_event: FsEvent,
    state: Cell<WatcherState>,
    stats: Cell<ReloadStats>,
    last_error: RefCell<Option<Rc<WatchError>>>,
}

impl<C: Finalize + 'static> Core<C> {
    fn update_stats(&self, f: impl FnOnce(&mut ReloadStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn is_terminal(&self) -> bool {
        self.state.get().is_terminal()
    }

    fn start_watch(self: &Rc<Self>) -> Result<(), WatchError> {
        let weak = Rc::downgrade(self);
        self.fs_event.start(&self.path, move |notification| {
            if let Some(core) = weak.upgrade() {
                core.on_notification(notification);
            }
        })
    }

    fn on_notification(self: &Rc<Self>, notification: FsNotification) {
        if self.is_terminal() {
            return;
        }
        self.update_stats(|s| s.notifications += 1);

        let Some(filename) = notification.filename else {
            tracing::trace!(path = %self.path.display(), "ignoring notification without a filename");
            self.update_stats(|s| s.ignored += 1);
            return;
        };

        if !notification.kind.is_change() {
            tracing::warn!(
                path = %self.path.display(),
                error = %notification.kind,
                "file watch reported an error"
            );
            self.update_stats(|s| s.ignored += 1);
            return;
        }

        tracing::debug!(
            path = %self.path.display(),
            file = %filename.display(),
            kind = %notification.kind,
            "change notification"
        );
        self.queue_update();
    }

    fn queue_update(self: &Rc<Self>) {
        if self.is_terminal() {
            return;
        }

        let weak = Rc::downgrade(self);
        self.debounce_timer.start(self.options.debounce, move || {
            if let Some(core) = weak.upgrade() {
                core.reload();
            }
        });

        if self.state.get() == WatcherState::Idle {
            self.state.set(WatcherState::PendingReload);
        }
    }

    fn reload(self: &Rc<Self>) {
        if self.is_terminal() {
            return;
        }
        if self.state.get() == WatcherState::PendingReload {
            self.state.set(WatcherState::Idle);
        }

        tracing::warn!(
            path = %self.path.display(),
            "\"{}\" was changed, reloading configuration",
            self.path.display()
        );
        self.update_stats(|s| s.attempts += 1);

        match ReloadOutcome::attempt(&*self.factory, &*self.loader, &self.path) {
            ReloadOutcome::Accepted(config) => {
                self.update_stats(|s| s.accepted += 1);
                tracing::info!(path = %self.path.display(), "configuration reloaded");
                self.listener.borrow_mut().on_new_config(config);
            }
            ReloadOutcome::Rejected(reason) => {
                self.update_stats(|s| s.rejected += 1);
                tracing::error!(
                    path = %self.path.display(),
                    reason = %reason,
                    "reloading failed, keeping the previous configuration"
                );
            }
        }

        if self.options.replace_policy.needs_restart() && !self.is_terminal() {
            self.restart_timer.stop();
            self.rearm_watch(1);
        }
    }

    fn rearm_watch(self: &Rc<Self>, attempt: u32) {
        if self.is_terminal() {
            return;
        }

        match self.fs_event.restart() {
            Ok(()) => {
                self.update_stats(|s| s.restarts += 1);
                if attempt > 1 {
                    tracing::info!(
                        path = %self.path.display(),
                        attempt,
                        "file watch re-armed"
                    );
                }
                if matches!(self.state.get(), WatcherState::Restarting { .. }) {
                    self.state.set(if self.debounce_timer.is_pending() {
                        WatcherState::PendingReload
                    } else {
                        WatcherState::Idle
                    });
                }
            }
            Err(WatchError::Stopped) => {}
            Err(err) => {
                let backoff = self.options.restart_backoff;
                if attempt >= backoff.max_attempts {
                    self.fail(WatchError::restart_failed(&self.path, attempt, err));
                    return;
                }

                let delay = backoff.delay_after(attempt);
                tracing::warn!(
                    path = %self.path.display(),
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "failed to re-arm file watch, retrying"
                );
                self.state.set(WatcherState::Restarting { attempt });

                let weak = Rc::downgrade(self);
                self.restart_timer.start(delay, move || {
                    if let Some(core) = weak.upgrade() {
                        core.rearm_watch(attempt + 1);
                    }
                });
            }
        }
    }

    fn fail(&self, err: WatchError) {
        tracing::error!(
            path = %self.path.display(),
            error = %err,
            "file watch lost, configuration changes will no longer be observed"
        );

        self.state.set(WatcherState::Failed);
        self.release();

        let err = Rc::new(err);
        *self.last_error.borrow_mut() = Some(err.clone());
        self.listener.borrow_mut().on_watch_lost(&err);
    }

    fn release(&self) {
        self.debounce_timer.stop();
        self.restart_timer.stop();
        self.fs_event.stop();
    }
}

/// Watches one configuration file and reloads it after changes settle.
///
/// Every change notification (re)arms a debounce timer. When the timer
/// fires, a fresh configuration is created, loaded from the file and
/// finalized. Accepted configurations move into the listener; rejected ones
/// are logged at error level and dropped, leaving whatever the listener holds
/// untouched.
///
/// # Example
///
/// ```rust,ignore
/// let event_loop = EventLoop::new();
/// let watcher = ConfigWatcher::new(
///     &event_loop.handle(),
///     "cfg.json",
///     FileConfig::<Settings>::default,
///     FileLoader::new(),
///     slot.file_listener(),
/// )?;
///
/// event_loop.run();
/// ```
pub struct ConfigWatcher<C: Finalize + 'static> {
    core: Rc<Core<C>>,
}

impl<C: Finalize + 'static> ConfigWatcher<C> {
    /// Start watching `path` with default options.
    ///
    /// Registration happens before this returns; no reload happens until a
    /// change notification arrives.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the path is empty or cannot be watched.
    pub fn new<F, L, Li>(
        handle: &LoopHandle,
        path: impl AsRef<Path>,
        factory: F,
        loader: L,
        listener: Li,
    ) -> Result<Self, WatchError>
    where
        F: ConfigFactory<C> + 'static,
        L: ConfigLoader<C> + 'static,
        Li: WatcherListener<C> + 'static,
    {
        Self::with_options(
            handle,
            path.as_ref(),
            WatcherOptions::default(),
            Box::new(factory),
            Box::new(loader),
            Box::new(listener),
        )
    }

    pub(crate) fn with_options(
        handle: &LoopHandle,
        path: &Path,
        options: WatcherOptions,
        factory: Box<dyn ConfigFactory<C>>,
        loader: Box<dyn ConfigLoader<C>>,
        listener: Box<dyn WatcherListener<C>>,
    ) -> Result<Self, WatchError> {
        if path.as_os_str().is_empty() {
            return Err(WatchError::init_failed("no file specified to watch", None));
        }

        let core = Rc::new(Core {
            path: path.to_path_buf(),
            options,
            factory,
            loader,
            listener: RefCell::new(listener),
            debounce_timer: Timer::new(handle),
            restart_timer: Timer::new(handle),
            fs_event: FsEvent::new(handle),
            state: Cell::new(WatcherState::Idle),
            stats: Cell::new(ReloadStats::default()),
            last_error: RefCell::new(None),
        });

        core.start_watch()?;
        tracing::debug!(
            path = %core.path.display(),
            debounce_ms = u64::try_from(options.debounce.as_millis()).unwrap_or(u64::MAX),
            "watching configuration file"
        );

        Ok(Self { core })
    }

    /// The watched path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.core.path
    }

    /// The debounce delay in use.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.core.options.debounce
    }

    /// The replace policy in use.
    #[must_use]
    pub fn replace_policy(&self) -> ReplacePolicy {
        self.core.options.replace_policy
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WatcherState {
        self.core.state.get()
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> ReloadStats {
        self.core.stats.get()
    }

    /// Returns `true` until the watcher is stopped or loses its watch.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.core.is_terminal()
    }

    /// The error that made the watcher give up, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<Rc<WatchError>> {
        self.core.last_error.borrow().clone()
    }

    /// Treat this call as a change notification.
    ///
    /// The reload still goes through the debounce timer.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Stopped`] once the watcher is terminal.
    pub fn queue_update(&self) -> Result<(), WatchError> {
        if self.core.is_terminal() {
            return Err(WatchError::Stopped);
        }
        self.core.queue_update();
        Ok(())
    }

    /// Cancel any pending reload and release the watch.
    ///
    /// Safe to call before any event and safe to call twice.
    pub fn stop(&self) {
        if self.core.state.get() != WatcherState::Stopped {
            tracing::debug!(path = %self.core.path.display(), "stopping configuration watcher");
        }
        self.core.state.set(WatcherState::Stopped);
        self.core.release();
    }
}

impl<C: Finalize + 'static> Drop for ConfigWatcher<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

// Manual Debug impl to avoid requiring C: Debug
impl<C: Finalize + 'static> fmt::Debug for ConfigWatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("path", &self.core.path)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
