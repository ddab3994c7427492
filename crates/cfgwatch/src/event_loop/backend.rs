//! Filesystem notification backends.
//!
//! A [`WatchBackend`] turns "watch this path" into a stream of
//! [`FsNotification`]s pushed through a [`NotificationSink`]. The sink is
//! `Send`, so backends that deliver from their own thread (like `notify`)
//! marshal events onto the loop thread without any extra locking.
//!
//! - [`NotifyBackend`] - the platform watcher from the `notify` crate
//! - [`ManualBackend`] - deterministic backend driven by the caller

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crossbeam_channel::Sender;
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::LoopMessage;
use crate::error::WatchError;

/// What kind of change a notification reports.
///
/// The watcher reloads on every kind except [`NotificationKind::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotificationKind {
    /// File contents or metadata were modified.
    Modified,

    /// The file was created (possibly recreated by an editor swap).
    Created,

    /// The file was removed.
    Removed,

    /// The file was renamed or replaced through a rename.
    Renamed,

    /// The platform reported a change it could not classify.
    Other,

    /// The backend reported an error instead of a change.
    Error(String),
}

impl NotificationKind {
    /// Returns `true` for notifications that describe a change.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Error(_))
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modified => f.write_str("modified"),

            Self::Created => f.write_str("created"),

            Self::Removed => f.write_str("removed"),

            Self::Renamed => f.write_str("renamed"),

            Self::Other => f.write_str("changed"),

            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// A single change notification for a watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsNotification {
    /// The file the notification is about. Some platforms omit it.
    pub filename: Option<PathBuf>,

    /// What happened.
    pub kind: NotificationKind,
}

impl FsNotification {
    /// Create a notification for `filename`.
    pub fn new(filename: impl Into<PathBuf>, kind: NotificationKind) -> Self {
        Self {
            filename: Some(filename.into()),
            kind,
        }
    }

    /// Create a notification with no associated filename.
    #[must_use]
    pub const fn anonymous(kind: NotificationKind) -> Self {
        Self {
            filename: None,
            kind,
        }
    }

    /// Translate a `notify` event.
    ///
    /// Returns `None` for pure reads, which do not change the file. Write
    /// closes are kept since some platforms report saves only that way.
    #[must_use]
    pub fn from_notify(event: &Event) -> Option<Self> {
        let kind = match event.kind {
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => NotificationKind::Modified,
            EventKind::Access(_) => return None,
            EventKind::Create(_) => NotificationKind::Created,
            EventKind::Modify(notify::event::ModifyKind::Name(_)) => NotificationKind::Renamed,
            EventKind::Modify(_) => NotificationKind::Modified,
            EventKind::Remove(_) => NotificationKind::Removed,
            EventKind::Any | EventKind::Other => NotificationKind::Other,
        };

        Some(Self {
            filename: event.paths.first().cloned(),
            kind,
        })
    }
}

/// Delivers notifications from a backend to one registration on the loop.
///
/// Cheap to clone and `Send`. Notifications sent after the registration was
/// stopped are discarded by the loop.
#[derive(Clone)]
pub struct NotificationSink {
    tx: Sender<LoopMessage>,
    source: u64,
    generation: u64,
}

impl NotificationSink {
    pub(crate) const fn new(tx: Sender<LoopMessage>, source: u64, generation: u64) -> Self {
        Self {
            tx,
            source,
            generation,
        }
    }

    /// Queue a notification. Returns `false` if the loop is gone.
    pub fn notify(&self, notification: FsNotification) -> bool {
        self.tx
            .send(LoopMessage::Fs {
                source: self.source,
                generation: self.generation,
                notification,
            })
            .is_ok()
    }
}

impl fmt::Debug for NotificationSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationSink")
            .field("source", &self.source)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Keeps a registration alive. Dropping it deregisters the watch.
pub trait WatchGuard {
    /// The registered path.
    fn path(&self) -> &Path;
}

/// Platform service that registers filesystem watches.
pub trait WatchBackend {
    /// Register a watch on `path`, delivering notifications to `sink` until
    /// the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the path cannot be watched.
    fn register(
        &self,
        path: &Path,
        sink: NotificationSink,
    ) -> Result<Box<dyn WatchGuard>, WatchError>;
}

// ============================================================================
// notify backend
// ============================================================================

/// Backend built on [`notify::recommended_watcher`].
///
/// Each registration owns its own watcher, so stopping one never disturbs
/// another.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

struct NotifyGuard {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl WatchGuard for NotifyGuard {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl WatchBackend for NotifyBackend {
    fn register(
        &self,
        path: &Path,
        sink: NotificationSink,
    ) -> Result<Box<dyn WatchGuard>, WatchError> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let notification = match res {
                Ok(event) => FsNotification::from_notify(&event),
                Err(e) => Some(FsNotification {
                    filename: e.paths.first().cloned(),
                    kind: NotificationKind::Error(e.to_string()),
                }),
            };

            if let Some(notification) = notification {
                let _ = sink.notify(notification);
            }
        })
        .map_err(|e| {
            WatchError::init_failed(format!("failed to create file watcher: {e}"), Some(e))
        })?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::path_error(path, format!("failed to watch: {e}")))?;

        Ok(Box::new(NotifyGuard {
            path: path.to_path_buf(),
            _watcher: watcher,
        }))
    }
}

// ============================================================================
// Manual backend
// ============================================================================

struct ManualRegistration {
    path: PathBuf,
    sink: NotificationSink,
    alive: Rc<Cell<bool>>,
}

#[derive(Default)]
struct ManualState {
    registrations: Vec<ManualRegistration>,
    fail_next: u32,
    total: u32,
}

/// Backend that only delivers what the caller emits.
///
/// Useful for deterministic tests and for hosts that already receive change
/// notifications from elsewhere.
///
/// ```rust,ignore
/// let backend = Rc::new(ManualBackend::new());
/// let event_loop = EventLoop::with_parts(clock, backend.clone());
///
/// backend.emit("cfg.json", NotificationKind::Modified);
/// event_loop.run_pending();
/// ```
#[derive(Default)]
pub struct ManualBackend {
    state: RefCell<ManualState>,
}

struct ManualGuard {
    path: PathBuf,
    alive: Rc<Cell<bool>>,
}

impl WatchGuard for ManualGuard {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ManualGuard {
    fn drop(&mut self) {
        self.alive.set(false);
    }
}

impl ManualBackend {
    /// Create a backend with no registrations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a notification for `path` to every live registration on it.
    /// Returns how many registrations received it.
    pub fn emit(&self, path: impl AsRef<Path>, kind: NotificationKind) -> usize {
        let path = path.as_ref();
        self.deliver(|r| r.path == path, || FsNotification::new(path, kind.clone()))
    }

    /// Deliver a notification without a filename to every live registration.
    pub fn emit_anonymous(&self, kind: NotificationKind) -> usize {
        self.deliver(|_| true, || FsNotification::anonymous(kind.clone()))
    }

    fn deliver<P, N>(&self, matches: P, make: N) -> usize
    where
        P: Fn(&ManualRegistration) -> bool,
        N: Fn() -> FsNotification,
    {
        let mut state = self.state.borrow_mut();
        state.registrations.retain(|r| r.alive.get());

        let mut delivered = 0;
        for registration in &state.registrations {
            if matches(registration) && registration.sink.notify(make()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Make the next `count` registrations fail, as if the file had vanished.
    pub fn fail_next_registrations(&self, count: u32) {
        self.state.borrow_mut().fail_next = count;
    }

    /// Registrations attempted so far, including failed ones.
    #[must_use]
    pub fn registrations(&self) -> u32 {
        self.state.borrow().total
    }

    /// Number of live registrations on `path`.
    #[must_use]
    pub fn active(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.state
            .borrow()
            .registrations
            .iter()
            .filter(|r| r.alive.get() && r.path == path)
            .count()
    }
}

impl WatchBackend for ManualBackend {
    fn register(
        &self,
        path: &Path,
        sink: NotificationSink,
    ) -> Result<Box<dyn WatchGuard>, WatchError> {
        let mut state = self.state.borrow_mut();
        state.total += 1;

        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(WatchError::path_error(path, "registration refused"));
        }

        let alive = Rc::new(Cell::new(true));
        state.registrations.push(ManualRegistration {
            path: path.to_path_buf(),
            sink,
            alive: alive.clone(),
        });

        Ok(Box::new(ManualGuard {
            path: path.to_path_buf(),
            alive,
        }))
    }
}

impl fmt::Debug for ManualBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ManualBackend")
            .field("registrations", &state.total)
            .field("fail_next", &state.fail_next)
            .finish_non_exhaustive()
    }
}
