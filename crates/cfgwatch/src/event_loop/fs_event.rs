//! Filesystem watch handles.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::backend::{FsNotification, NotificationSink, WatchGuard};
use super::{LoopHandle, Shared};
use crate::error::WatchError;

/// Callback invoked for each notification of an active watch.
pub(crate) type FsCallback = Rc<dyn Fn(FsNotification)>;

#[derive(Default)]
pub(crate) struct SourceSlot {
    pub generation: u64,
    pub path: Option<PathBuf>,
    pub guard: Option<Box<dyn WatchGuard>>,
    pub callback: Option<FsCallback>,
}

impl SourceSlot {
    /// The callback for a notification from `generation`, if still current.
    pub fn callback_for(&self, generation: u64) -> Option<FsCallback> {
        if self.generation != generation || self.guard.is_none() {
            return None;
        }
        self.callback.clone()
    }
}

/// A filesystem watch bound to an event loop.
///
/// Notifications are delivered on the loop thread in arrival order. Once
/// [`stop`](Self::stop) returns, no notification from the stopped
/// registration reaches the callback, even if it was already queued.
pub struct FsEvent {
    id: u64,
    shared: Rc<Shared>,
}

impl FsEvent {
    /// Create an inactive watch handle on the given loop.
    #[must_use]
    pub fn new(handle: &LoopHandle) -> Self {
        let shared = handle.shared().clone();
        let id = shared.next_source_id();
        shared.sources.borrow_mut().insert(id, SourceSlot::default());
        Self { id, shared }
    }

    /// Register a watch on `path`, replacing any active registration.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the backend refuses the path. The handle is
    /// inactive afterwards but remembers `path` and `callback`, so
    /// [`restart`](Self::restart) can try again.
    pub fn start<F>(&self, path: impl AsRef<Path>, callback: F) -> Result<(), WatchError>
    where
        F: Fn(FsNotification) + 'static,
    {
        let path = path.as_ref().to_path_buf();
        let previous = {
            let mut sources = self.shared.sources.borrow_mut();
            let slot = sources.entry(self.id).or_default();
            slot.path = Some(path);
            slot.callback = Some(Rc::new(callback));
            slot.guard.take()
        };
        drop(previous);

        self.register()
    }

    /// Drop the current registration and register the same path again.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Stopped`] if the handle was never started or was
    /// stopped, or the backend's error if registration fails.
    pub fn restart(&self) -> Result<(), WatchError> {
        let previous = {
            let mut sources = self.shared.sources.borrow_mut();
            let Some(slot) = sources.get_mut(&self.id) else {
                return Err(WatchError::Stopped);
            };
            if slot.callback.is_none() {
                return Err(WatchError::Stopped);
            }
            slot.guard.take()
        };
        drop(previous);

        self.register()
    }

    fn register(&self) -> Result<(), WatchError> {
        let (path, sink) = {
            let mut sources = self.shared.sources.borrow_mut();
            let slot = sources.get_mut(&self.id).ok_or(WatchError::Stopped)?;
            let path = slot.path.clone().ok_or(WatchError::Stopped)?;

            slot.generation += 1;
            let sink = NotificationSink::new(self.shared.tx.clone(), self.id, slot.generation);
            (path, sink)
        };

        let guard = self.shared.backend.register(&path, sink)?;

        if let Some(slot) = self.shared.sources.borrow_mut().get_mut(&self.id) {
            slot.guard = Some(guard);
        }
        Ok(())
    }

    /// Deregister the watch. Safe to call any number of times.
    pub fn stop(&self) {
        let (guard, callback) = {
            let mut sources = self.shared.sources.borrow_mut();
            match sources.get_mut(&self.id) {
                Some(slot) => {
                    slot.generation += 1;
                    (slot.guard.take(), slot.callback.take())
                }
                None => (None, None),
            }
        };
        drop(guard);
        drop(callback);
    }

    /// Returns `true` while a registration is live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared
            .sources
            .borrow()
            .get(&self.id)
            .is_some_and(|slot| slot.guard.is_some())
    }

    /// The path passed to the last [`start`](Self::start).
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.shared
            .sources
            .borrow()
            .get(&self.id)
            .and_then(|slot| slot.path.clone())
    }
}

impl Drop for FsEvent {
    fn drop(&mut self) {
        self.stop();
        let slot = self.shared.sources.borrow_mut().remove(&self.id);
        drop(slot);
    }
}

impl fmt::Debug for FsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsEvent")
            .field("id", &self.id)
            .field("path", &self.path())
            .field("active", &self.is_active())
            .finish()
    }
}
