//! File-backed configuration objects.
//!
//! [`FileConfig`] and [`FileLoader`] plug serde types into the watcher
//! without any glue code:
//!
//! ```rust,ignore
//! #[derive(Deserialize)]
//! struct Settings { port: u16 }
//!
//! impl Finalize for Settings {
//!     fn finalize(&mut self) -> bool { self.port != 0 }
//! }
//!
//! let watcher = ConfigWatcher::new(
//!     &handle,
//!     "settings.toml",
//!     FileConfig::<Settings>::default,
//!     FileLoader::new(),
//!     slot.file_listener(),
//! )?;
//! ```
//!
//! # Supported Formats
//!
//! | Format | Feature Flag | Extensions |
//! |--------|--------------|------------|
//! | JSON | always | `.json` |
//! | TOML | `toml` | `.toml` |
//! | YAML | `yaml` | `.yaml`, `.yml` |
//!
//! # Error Handling
//!
//! Parse errors carry source locations when the parser reports one,
//! enabling rich diagnostic output via [`miette`]:
//!
//! ```text
//! Error: JSON parse error in settings.json
//!    ╭─[settings.json:3:11]
//!    │
//!  3 │   "port": ,
//!    │           ┬
//!    │           ╰── expected value at line 3 column 11
//!    ╰────
//! ```

mod error;
mod format;
mod loader;

pub use error::FileError;
pub use format::FileFormat;
pub use loader::FileLoader;

use crate::config::Finalize;

/// A configuration slot filled from a file.
///
/// Holds either the deserialized value or the error that prevented it.
/// [`Finalize`] accepts it only when a value is present, no error was
/// recorded and the value's own `finalize` passes.
#[derive(Debug)]
pub struct FileConfig<T> {
    value: Option<T>,
    error: Option<FileError>,
}

impl<T> FileConfig<T> {
    /// The parsed value, if loading succeeded.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The error recorded by the last load, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&FileError> {
        self.error.as_ref()
    }

    /// Take the parsed value.
    #[must_use]
    pub fn into_inner(self) -> Option<T> {
        self.value
    }

    pub(crate) fn set_value(&mut self, value: T) {
        self.value = Some(value);
        self.error = None;
    }

    pub(crate) fn set_error(&mut self, error: FileError) {
        self.value = None;
        self.error = Some(error);
    }
}

impl<T> Default for FileConfig<T> {
    fn default() -> Self {
        Self {
            value: None,
            error: None,
        }
    }
}

impl<T: Finalize> Finalize for FileConfig<T> {
    fn finalize(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.value.as_mut().is_some_and(|value| value.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Port(u16);

    impl Finalize for Port {
        fn finalize(&mut self) -> bool {
            self.0 != 0
        }
    }

    #[test]
    fn test_empty_config_is_rejected() {
        let mut cfg = FileConfig::<Port>::default();
        assert!(!cfg.finalize());
        assert!(cfg.value().is_none());
        assert!(cfg.error().is_none());
    }

    #[test]
    fn test_value_is_finalized() {
        let mut cfg = FileConfig::default();
        cfg.set_value(Port(8080));
        assert!(cfg.finalize());
        assert!(cfg.finalize());

        cfg.set_value(Port(0));
        assert!(!cfg.finalize());
    }

    #[test]
    fn test_error_wins_over_value() {
        let mut cfg = FileConfig::default();
        cfg.set_value(Port(8080));
        cfg.set_error(FileError::NotFound {
            path: "cfg.json".into(),
        });

        assert!(!cfg.finalize());
        assert!(cfg.into_inner().is_none());
    }
}
