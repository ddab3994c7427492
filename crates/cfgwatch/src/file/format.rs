//! File format detection.
//!
//! | Format | Feature | Extensions |
//! |--------|---------|------------|
//! | JSON | always | `.json` |
//! | TOML | `toml` | `.toml` |
//! | YAML | `yaml` | `.yaml`, `.yml` |

use std::path::Path;

/// Supported configuration file formats.
///
/// # Example
///
/// ```rust
/// use cfgwatch::file::FileFormat;
/// use std::path::Path;
///
/// assert_eq!(FileFormat::from_path(Path::new("cfg.json")), Some(FileFormat::Json));
/// assert_eq!(FileFormat::from_path(Path::new("cfg.txt")), None);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileFormat {
    /// JSON format (`.json` extension).
    Json,

    /// TOML format (`.toml` extension).
    ///
    /// Requires the `toml` feature flag.
    #[cfg(feature = "toml")]
    Toml,

    /// YAML format (`.yaml` or `.yml` extension).
    ///
    /// Requires the `yaml` feature flag.
    #[cfg(feature = "yaml")]
    Yaml,
}

impl FileFormat {
    /// Detects the file format from the file extension.
    ///
    /// Returns `None` if the extension is not recognized or if the
    /// required feature flag is not enabled.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),

            #[cfg(feature = "toml")]
            "toml" => Some(Self::Toml),

            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Some(Self::Yaml),

            _ => None,
        }
    }

    /// Format name for error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Json => "JSON",

            #[cfg(feature = "toml")]
            Self::Toml => "TOML",

            #[cfg(feature = "yaml")]
            Self::Yaml => "YAML",
        }
    }

    pub(crate) const fn parse_help(self) -> &'static str {
        match self {
            Self::Json => "check for missing commas, quotes, or brackets",

            #[cfg(feature = "toml")]
            Self::Toml => "check for missing quotes, invalid values, or syntax errors",

            #[cfg(feature = "yaml")]
            Self::Yaml => "check indentation and ensure proper YAML syntax",
        }
    }
}
