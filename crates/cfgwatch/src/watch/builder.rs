//! Builder for configuring reload behavior.
//!
//! The [`WatchBuilder`] provides a fluent API for setting up a watcher with
//! a custom debounce delay, replace policy and restart schedule.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::{ReplacePolicy, RestartBackoff};
use super::watcher::{ConfigWatcher, WatcherOptions};
use crate::config::{ConfigFactory, ConfigLoader, Finalize, WatcherListener};
use crate::error::WatchError;
use crate::event_loop::LoopHandle;

/// Builder for configuring a [`ConfigWatcher`].
///
/// # Example
///
/// ```rust,ignore
/// let watcher = WatchBuilder::new("cfg.json")
///     .debounce(Duration::from_millis(250))
///     .replace_policy(ReplacePolicy::Restart)
///     .build(&handle, FileConfig::<Settings>::default, FileLoader::new(), slot.file_listener())?;
/// ```
#[derive(Debug, Clone)]
pub struct WatchBuilder {
    /// File to watch.
    path: PathBuf,

    /// Watcher options (debounce defaults to one second).
    options: WatcherOptions,
}

impl WatchBuilder {
    /// Create a builder for `path` with default settings.
    ///
    /// Default settings:
    /// - 1000ms debounce
    /// - replace policy detected for the current platform
    /// - 5 restart attempts starting at 100ms
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options: WatcherOptions::default(),
        }
    }

    /// Set the debounce delay.
    ///
    /// Editors frequently emit several events for a single save. The delay
    /// controls how long to wait after the last one before reloading.
    #[must_use]
    pub const fn debounce(mut self, delay: Duration) -> Self {
        self.options.debounce = delay;
        self
    }

    /// Override the platform's replace policy.
    #[must_use]
    pub const fn replace_policy(mut self, policy: ReplacePolicy) -> Self {
        self.options.replace_policy = policy;
        self
    }

    /// Set the retry schedule used when the watch cannot be re-armed.
    #[must_use]
    pub const fn restart_backoff(mut self, backoff: RestartBackoff) -> Self {
        self.options.restart_backoff = backoff;
        self
    }

    /// Register the watch and return the running watcher.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if:
    /// - The path is empty
    /// - The backend refuses to watch the path
    pub fn build<C, F, L, Li>(
        self,
        handle: &LoopHandle,
        factory: F,
        loader: L,
        listener: Li,
    ) -> Result<ConfigWatcher<C>, WatchError>
    where
        C: Finalize + 'static,
        F: ConfigFactory<C> + 'static,
        L: ConfigLoader<C> + 'static,
        Li: WatcherListener<C> + 'static,
    {
        ConfigWatcher::with_options(
            handle,
            &self.path,
            self.options,
            Box::new(factory),
            Box::new(loader),
            Box::new(listener),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = WatchBuilder::new("cfg.json");
        assert_eq!(builder.path, PathBuf::from("cfg.json"));
        assert_eq!(builder.options.debounce, Duration::from_millis(1000));
        assert_eq!(builder.options.restart_backoff, RestartBackoff::default());
    }

    #[test]
    fn test_builder_fluent_api() {
        let backoff = RestartBackoff {
            initial: Duration::from_millis(10),
            factor: 3,
            max_attempts: 2,
        };
        let builder = WatchBuilder::new("cfg.json")
            .debounce(Duration::from_millis(200))
            .replace_policy(ReplacePolicy::Survives)
            .restart_backoff(backoff);

        assert_eq!(builder.options.debounce, Duration::from_millis(200));
        assert_eq!(builder.options.replace_policy, ReplacePolicy::Survives);
        assert_eq!(builder.options.restart_backoff, backoff);
    }
}
