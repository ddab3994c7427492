//! File error types with rich diagnostics.

use miette::{Diagnostic, NamedSource, SourceSpan};

/// Error type for loading a configuration file.
///
/// [`FileLoader`](super::FileLoader) never raises these during a reload; it
/// records them on the [`FileConfig`](super::FileConfig) being loaded, where
/// they make `finalize` fail. They integrate with [`miette`], so syntax errors
/// render with the offending line highlighted.
///
/// # Example Output
///
/// ```text
/// Error: TOML parse error in cfg.toml
///    ╭─[cfg.toml:5:12]
///    │
///  5 │ port = "8080
///    │        ^^^^^ invalid basic string
///    ╰────
///   help: check for missing quotes, invalid values, or syntax errors
/// ```
#[derive(Debug, Diagnostic, thiserror::Error)]
#[non_exhaustive]
pub enum FileError {
    /// Configuration file not found
    #[error("configuration file not found: {path}")]
    #[diagnostic(
        code(cfgwatch::file::not_found),
        help("ensure the file exists at the watched path")
    )]
    NotFound {
        /// Path to the missing file
        path: String,
    },

    /// Failed to read file
    #[error("failed to read configuration file: {path}")]
    #[diagnostic(
        code(cfgwatch::file::read_error),
        help("check file permissions and ensure it's readable")
    )]
    ReadError {
        /// Path to the file
        path: String,

        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Unknown file format
    #[error("unknown configuration file format: .{extension}")]
    #[diagnostic(
        code(cfgwatch::file::unknown_format),
        help("supported formats: .json, .toml, .yaml, .yml (TOML and YAML need their features)")
    )]
    UnknownFormat {
        /// The file extension that wasn't recognized
        extension: String,
    },

    /// Parse error with source location
    #[error("{format} parse error in {path}")]
    #[diagnostic(code(cfgwatch::file::parse_error))]
    Parse {
        /// Format name
        format: &'static str,

        /// Path to the file
        path: String,

        /// The source file content for display
        #[source_code]
        src: NamedSource<String>,

        /// The location of the error
        #[label("{message}")]
        span: SourceSpan,

        /// Description of what went wrong
        message: String,

        /// Suggestion for how to fix
        #[help]
        help: String,
    },

    /// Parse error without source location
    #[error("{format} parse error: {message}")]
    #[diagnostic(code(cfgwatch::file::parse_error))]
    ParseNoSpan {
        /// Format name
        format: &'static str,

        /// Description of what went wrong
        message: String,

        /// Suggestion for how to fix
        #[help]
        help: String,
    },

    /// The document parsed but does not fit the target type
    #[error("type mismatch at `{field}` in {path}: {message}")]
    #[diagnostic(
        code(cfgwatch::file::type_mismatch),
        help("check that the value matches the expected type")
    )]
    TypeMismatch {
        /// Dotted path of the failing field (e.g. `database.port`)
        field: String,

        /// Path to the file
        path: String,

        /// Description of what went wrong
        message: String,
    },
}

impl FileError {
    /// The file this error refers to, when it names one.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::NotFound { path }
            | Self::ReadError { path, .. }
            | Self::Parse { path, .. }
            | Self::TypeMismatch { path, .. } => Some(path),
            Self::UnknownFormat { .. } | Self::ParseNoSpan { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message_names_field() {
        let err = FileError::TypeMismatch {
            field: "database.port".into(),
            path: "cfg.json".into(),
            message: "invalid type: string \"x\", expected u16".into(),
        };

        let msg = err.to_string();
        assert!(msg.contains("database.port"));
        assert!(msg.contains("cfg.json"));
        assert_eq!(err.path(), Some("cfg.json"));
    }

    #[test]
    fn test_diagnostic_codes() {
        let err = FileError::NotFound {
            path: "missing.json".into(),
        };
        assert_eq!(
            err.code().map(|c| c.to_string()).as_deref(),
            Some("cfgwatch::file::not_found")
        );

        let err = FileError::UnknownFormat {
            extension: "ini".into(),
        };
        assert!(err.path().is_none());
        assert!(err.help().is_some());
    }
}
