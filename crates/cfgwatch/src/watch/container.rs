//! Thread-safe home for the active configuration.
//!
//! A [`ConfigSlot`] is where accepted configurations end up. The watcher runs
//! on the loop thread, but readers can live anywhere: the slot hands out
//! `Arc<T>` snapshots behind a [`parking_lot::RwLock`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::types::ConfigChange;
use crate::config::WatcherListener;
use crate::error::WatchError;
use crate::file::FileConfig;

type Subscriber<T> = Box<dyn Fn(&ConfigChange<T>) + Send + Sync + 'static>;

/// Thread-safe container for the active configuration.
///
/// # Thread Safety
///
/// - Multiple threads can read the configuration concurrently
/// - Updates are atomic - readers never see partial updates
/// - The epoch counter allows efficient change detection
///
/// # Example
///
/// ```rust,ignore
/// let slot = Arc::new(ConfigSlot::new(Settings::default()));
///
/// slot.subscribe(|change| {
///     println!("config replaced (epoch {})", change.epoch);
/// });
///
/// let watcher = ConfigWatcher::new(&handle, "cfg.json", factory, loader, slot.listener())?;
///
/// // Elsewhere
/// let port = slot.read(|cfg| cfg.port);
/// ```
pub struct ConfigSlot<T> {
    /// Current configuration, `None` until the first publish.
    inner: RwLock<Option<Arc<T>>>,

    /// Incremented on each publish.
    epoch: AtomicU64,

    /// Called after every publish.
    subscribers: RwLock<Vec<Subscriber<T>>>,
}

impl<T> ConfigSlot<T> {
    /// Create a slot holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            inner: RwLock::new(Some(Arc::new(initial))),
            epoch: AtomicU64::new(0),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Create a slot with nothing published yet.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(None),
            epoch: AtomicU64::new(0),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// The active configuration, if any.
    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.read().clone()
    }

    /// Read the active configuration via a closure, avoiding the `Arc` clone.
    pub fn read<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.inner.read();
        guard.as_deref().map(f)
    }

    /// The current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Check if the configuration was replaced since `epoch`.
    pub fn has_changed_since(&self, epoch: u64) -> bool {
        self.epoch() != epoch
    }

    /// Register a callback run after every publish.
    ///
    /// Callbacks run on the publishing thread while the subscriber list is
    /// read-locked; they must not call `subscribe`.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&ConfigChange<T>) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Box::new(callback));
    }

    /// Swap in a new configuration and notify subscribers.
    pub fn publish(&self, config: T) -> ConfigChange<T> {
        let current = Arc::new(config);

        let previous = {
            let mut guard = self.inner.write();
            std::mem::replace(&mut *guard, Some(current.clone()))
        };
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;

        let change = ConfigChange::new(previous, current, epoch);
        for subscriber in self.subscribers.read().iter() {
            subscriber(&change);
        }
        change
    }
}

impl<T: Send + Sync + 'static> ConfigSlot<T> {
    /// A watcher listener that publishes into this slot.
    #[must_use]
    pub fn listener(self: &Arc<Self>) -> SlotListener<T> {
        SlotListener { slot: self.clone() }
    }

    /// A watcher listener for [`FileConfig`] that publishes the parsed value.
    #[must_use]
    pub fn file_listener(self: &Arc<Self>) -> FileSlotListener<T> {
        FileSlotListener { slot: self.clone() }
    }
}

impl<T> Default for ConfigSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

// Manual Debug impl to avoid requiring T: Debug
impl<T> fmt::Debug for ConfigSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSlot")
            .field("epoch", &self.epoch())
            .field("subscribers", &self.subscribers.read().len())
            .finish_non_exhaustive()
    }
}

fn log_watch_lost(error: &WatchError) {
    tracing::error!(error = %error, "configuration slot will no longer receive reloads");
}

/// Publishes accepted configurations into a [`ConfigSlot`].
#[derive(Debug)]
pub struct SlotListener<T> {
    slot: Arc<ConfigSlot<T>>,
}

impl<T> WatcherListener<T> for SlotListener<T> {
    fn on_new_config(&mut self, config: T) {
        self.slot.publish(config);
    }

    fn on_watch_lost(&mut self, error: &WatchError) {
        log_watch_lost(error);
    }
}

/// Publishes the value inside accepted [`FileConfig`]s into a [`ConfigSlot`].
#[derive(Debug)]
pub struct FileSlotListener<T> {
    slot: Arc<ConfigSlot<T>>,
}

impl<T> WatcherListener<FileConfig<T>> for FileSlotListener<T> {
    fn on_new_config(&mut self, config: FileConfig<T>) {
        if let Some(value) = config.into_inner() {
            self.slot.publish(value);
        }
    }

    fn on_watch_lost(&mut self, error: &WatchError) {
        log_watch_lost(error);
    }
}
