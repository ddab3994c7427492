//! Collaborator contracts consumed by the watcher.
//!
//! The watcher never knows what a configuration looks like. It creates one
//! through a [`ConfigFactory`], fills it through a [`ConfigLoader`], asks it to
//! [`Finalize`] itself, and hands the result to a [`WatcherListener`].
//!
//! Closures implement every trait, so small hosts rarely need named types:
//!
//! ```rust,ignore
//! let watcher = WatchBuilder::new("cfg.json").build(
//!     &handle,
//!     Settings::default,
//!     |cfg: &mut Settings, path: &Path| cfg.read_from(path),
//!     move |cfg: Settings| slot.publish(cfg),
//! )?;
//! ```

use std::fmt::{self, Display, Formatter};
use std::path::Path;

use crate::error::WatchError;

/// A configuration object that can validate itself.
///
/// `finalize` converts a populated-but-unchecked object into a ready-to-use
/// one, or rejects it. It must be callable repeatedly without side effects
/// beyond the object itself.
pub trait Finalize {
    /// Returns `true` if the object is ready for use.
    fn finalize(&mut self) -> bool;
}

/// Produces fresh, empty configuration objects.
pub trait ConfigFactory<C> {
    /// Create a new configuration object. Must not touch existing state.
    fn create(&self) -> C;
}

impl<C, F> ConfigFactory<C> for F
where
    F: Fn() -> C,
{
    fn create(&self) -> C {
        self()
    }
}

/// Populates a configuration object from a file.
///
/// Loaders never fail loudly. A missing or malformed file leaves the object
/// in a state that its [`Finalize`] implementation rejects.
pub trait ConfigLoader<C> {
    /// Fill `config` from the file at `path`.
    fn load_from_file(&self, config: &mut C, path: &Path);
}

impl<C, F> ConfigLoader<C> for F
where
    F: Fn(&mut C, &Path),
{
    fn load_from_file(&self, config: &mut C, path: &Path) {
        self(config, path);
    }
}

/// Receives configurations that passed finalization.
pub trait WatcherListener<C> {
    /// Called exactly once per accepted reload. Ownership of `config` moves
    /// to the listener.
    fn on_new_config(&mut self, config: C);

    /// Called once when the watcher loses the ability to observe changes.
    fn on_watch_lost(&mut self, error: &WatchError) {
        let _ = error;
    }
}

impl<C, F> WatcherListener<C> for F
where
    F: FnMut(C),
{
    fn on_new_config(&mut self, config: C) {
        self(config);
    }
}

/// Why a reload candidate was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RejectReason {
    /// The configuration's `finalize` returned `false`.
    Finalize,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finalize => f.write_str("configuration failed to finalize"),
        }
    }
}

/// Result of one reload attempt. Never stored.
#[derive(Debug)]
pub enum ReloadOutcome<C> {
    /// The candidate is valid and ready to hand off.
    Accepted(C),

    /// The candidate was dropped.
    Rejected(RejectReason),
}

impl<C: Finalize> ReloadOutcome<C> {
    /// Run the create, load and finalize steps for `path`.
    pub fn attempt<F, L>(factory: &F, loader: &L, path: &Path) -> Self
    where
        F: ConfigFactory<C> + ?Sized,
        L: ConfigLoader<C> + ?Sized,
    {
        let mut config = factory.create();
        loader.load_from_file(&mut config, path);

        if config.finalize() {
            Self::Accepted(config)
        } else {
            Self::Rejected(RejectReason::Finalize)
        }
    }
}

impl<C> ReloadOutcome<C> {
    /// Returns `true` for [`ReloadOutcome::Accepted`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter {
        value: u32,
        finalized: u32,
    }

    impl Finalize for Counter {
        fn finalize(&mut self) -> bool {
            self.finalized += 1;
            self.value > 0
        }
    }

    #[test]
    fn test_attempt_accepts_finalized_config() {
        let loads = Cell::new(0);
        let loader = |cfg: &mut Counter, _: &Path| {
            loads.set(loads.get() + 1);
            cfg.value = 7;
        };

        let outcome = ReloadOutcome::attempt(&Counter::default, &loader, Path::new("cfg.json"));
        assert_eq!(loads.get(), 1);

        match outcome {
            ReloadOutcome::Accepted(cfg) => {
                assert_eq!(cfg.value, 7);
                assert_eq!(cfg.finalized, 1);
            }
            ReloadOutcome::Rejected(reason) => panic!("unexpected rejection: {reason}"),
        }
    }

    #[test]
    fn test_attempt_rejects_unfinalized_config() {
        let loader = |_: &mut Counter, _: &Path| {};
        let outcome = ReloadOutcome::attempt(&Counter::default, &loader, Path::new("cfg.json"));

        assert!(!outcome.is_accepted());
        assert!(matches!(
            outcome,
            ReloadOutcome::Rejected(RejectReason::Finalize)
        ));
    }

    #[test]
    fn test_closure_listener_uses_default_watch_lost() {
        let mut seen = Vec::new();
        {
            let mut listener = |cfg: Counter| seen.push(cfg.value);
            listener.on_new_config(Counter {
                value: 3,
                finalized: 0,
            });
            listener.on_watch_lost(&WatchError::Stopped);
        }
        assert_eq!(seen, vec![3]);
    }
}
