//! Reading and deserializing configuration files.

use std::io::ErrorKind;
use std::path::Path;

use miette::{NamedSource, SourceSpan};
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde_json as SJSON;

#[cfg(feature = "yaml")]
use serde_saphyr as YAML;

#[cfg(feature = "toml")]
use toml as TOML;

use super::FileConfig;
use super::error::FileError;
use super::format::FileFormat;
use crate::config::ConfigLoader;

/// Loads serde types from JSON, TOML or YAML files.
///
/// Every format is parsed into a [`serde_json::Value`] first, then
/// deserialized into the target type through [`serde_path_to_error`], so a
/// type mismatch names the field that failed regardless of the format.
///
/// As a [`ConfigLoader`] for [`FileConfig<T>`] it never fails: errors are
/// recorded on the config and make its `finalize` return `false`.
///
/// # Example
///
/// ```rust,ignore
/// let loader = FileLoader::new();
/// let settings: Settings = loader.load(Path::new("cfg.toml"))?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader {
    format: Option<FileFormat>,
}

impl FileLoader {
    /// A loader that picks the format from the file extension.
    #[must_use]
    pub const fn new() -> Self {
        Self { format: None }
    }

    /// A loader that always parses as `format`, whatever the extension.
    #[must_use]
    pub const fn with_format(format: FileFormat) -> Self {
        Self {
            format: Some(format),
        }
    }

    /// Read and deserialize the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FileError`] if the file is missing or unreadable, its format
    /// is unknown, it does not parse, or it does not fit `T`.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T, FileError> {
        let path_str = path.display().to_string();

        let format = match self.format {
            Some(format) => format,
            None => FileFormat::from_path(path).ok_or_else(|| FileError::UnknownFormat {
                extension: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            })?,
        };

        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FileError::NotFound {
                path: path_str.clone(),
            },
            _ => FileError::ReadError {
                path: path_str.clone(),
                source: e,
            },
        })?;

        let value = Self::parse_value(&content, format, path)?;
        Self::deserialize(value, &path_str)
    }

    /// Deserialize `content` as `format`.
    ///
    /// # Errors
    ///
    /// Returns [`FileError`] if the content does not parse or does not fit `T`.
    pub fn parse_str<T: DeserializeOwned>(content: &str, format: FileFormat) -> Result<T, FileError> {
        let dummy_path = Path::new("<string>");
        let value = Self::parse_value(content, format, dummy_path)?;
        Self::deserialize(value, "<string>")
    }

    fn parse_value(content: &str, format: FileFormat, path: &Path) -> Result<SJSON::Value, FileError> {
        match format {
            FileFormat::Json => {
                SJSON::from_str(content).map_err(|e| json_parse_error(&e, content, path))
            }

            #[cfg(feature = "toml")]
            FileFormat::Toml => {
                let table: TOML::Table =
                    TOML::from_str(content).map_err(|e| toml_parse_error(&e, content, path))?;
                Ok(toml_to_json(TOML::Value::Table(table)))
            }

            #[cfg(feature = "yaml")]
            FileFormat::Yaml => {
                YAML::from_str(content).map_err(|e| yaml_parse_error(&e, content, path))
            }
        }
    }

    fn deserialize<T: DeserializeOwned>(value: SJSON::Value, path: &str) -> Result<T, FileError> {
        let deserializer: SJSON::Value = value.into_deserializer();

        serde_path_to_error::deserialize(deserializer).map_err(|e| {
            let field = e.path().to_string();
            FileError::TypeMismatch {
                field,
                path: path.to_string(),
                message: e.inner().to_string(),
            }
        })
    }
}

impl<T: DeserializeOwned> ConfigLoader<FileConfig<T>> for FileLoader {
    fn load_from_file(&self, config: &mut FileConfig<T>, path: &Path) {
        match self.load(path) {
            Ok(value) => config.set_value(value),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load configuration file"
                );
                config.set_error(err);
            }
        }
    }
}

/// Byte offset of a 1-indexed line and column.
fn line_col_to_offset(content: &str, line: usize, col: usize) -> usize {
    let mut offset = 0;

    for (i, l) in content.split_inclusive('\n').enumerate() {
        if (i + 1) == line {
            return offset + col.saturating_sub(1);
        }

        offset += l.len();
    }

    offset
}

/// A span starting at `offset` and covering the token there.
fn offset_to_span(offset: usize, content: &str) -> SourceSpan {
    let offset = offset.min(content.len());
    let remaining = content.get(offset..).unwrap_or_default();
    let len = remaining
        .find(|c: char| c.is_whitespace() || (c == ',') || (c == '}') || (c == ']'))
        .unwrap_or_else(|| remaining.len().min(20))
        .max(1);

    SourceSpan::new(offset.into(), len)
}

fn json_parse_error(e: &SJSON::Error, content: &str, path: &Path) -> FileError {
    let offset = line_col_to_offset(content, e.line(), e.column());
    let format = FileFormat::Json;

    FileError::Parse {
        format: format.name(),
        path: path.display().to_string(),
        src: NamedSource::new(path.display().to_string(), content.to_string()),
        span: offset_to_span(offset, content),
        message: e.to_string(),
        help: format.parse_help().to_string(),
    }
}

#[cfg(feature = "toml")]
fn toml_parse_error(e: &TOML::de::Error, content: &str, path: &Path) -> FileError {
    let format = FileFormat::Toml;

    match e.span() {
        Some(span) => FileError::Parse {
            format: format.name(),
            path: path.display().to_string(),
            src: NamedSource::new(path.display().to_string(), content.to_string()),
            span: SourceSpan::new(span.start.into(), span.end.saturating_sub(span.start)),
            message: e.message().to_string(),
            help: format.parse_help().to_string(),
        },
        None => FileError::ParseNoSpan {
            format: format.name(),
            message: e.to_string(),
            help: format.parse_help().to_string(),
        },
    }
}

#[cfg(feature = "yaml")]
fn yaml_parse_error(e: &YAML::Error, content: &str, path: &Path) -> FileError {
    let format = FileFormat::Yaml;
    let msg = e.to_string();

    match extract_yaml_location(&msg) {
        Some((line, col)) => {
            let offset = line_col_to_offset(content, line, col);
            FileError::Parse {
                format: format.name(),
                path: path.display().to_string(),
                src: NamedSource::new(path.display().to_string(), content.to_string()),
                span: offset_to_span(offset, content),
                message: msg,
                help: format.parse_help().to_string(),
            }
        }
        None => FileError::ParseNoSpan {
            format: format.name(),
            message: msg,
            help: format.parse_help().to_string(),
        },
    }
}

/// Pull `line N ... column M` out of a YAML error message.
#[cfg(feature = "yaml")]
fn extract_yaml_location(msg: &str) -> Option<(usize, usize)> {
    let line_idx = msg.find("line ")?;
    let after_line = msg.get(line_idx + 5..)?;
    let line_end = after_line.find(|c: char| !c.is_ascii_digit())?;
    let line = after_line.get(..line_end)?.parse::<usize>().ok()?;

    let col_idx = after_line.find("column ")?;
    let after_col = after_line.get(col_idx + 7..)?;
    let col_end = after_col
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_col.len());
    let col = after_col.get(..col_end)?.parse::<usize>().ok()?;

    Some((line, col))
}

#[cfg(feature = "toml")]
fn toml_to_json(toml: TOML::Value) -> SJSON::Value {
    match toml {
        TOML::Value::String(s) => SJSON::Value::String(s),

        TOML::Value::Integer(i) => SJSON::Value::Number(i.into()),

        TOML::Value::Float(f) => {
            SJSON::Number::from_f64(f).map_or(SJSON::Value::Null, SJSON::Value::Number)
        }

        TOML::Value::Boolean(b) => SJSON::Value::Bool(b),

        TOML::Value::Datetime(dt) => SJSON::Value::String(dt.to_string()),

        TOML::Value::Array(arr) => SJSON::Value::Array(arr.into_iter().map(toml_to_json).collect()),

        TOML::Value::Table(table) => SJSON::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_to_offset() {
        let content = "{\n  \"a\": 1,\n  \"b\": x\n}";
        let offset = line_col_to_offset(content, 3, 8);
        assert_eq!(&content[offset..=offset], "x");
    }

    #[test]
    fn test_line_col_to_offset_crlf() {
        let content = "{\r\n  \"a\": 1,\r\n  \"b\": x\r\n}";
        let offset = line_col_to_offset(content, 3, 8);
        assert_eq!(&content[offset..=offset], "x");
    }

    #[test]
    fn test_offset_to_span_clamps() {
        let span = offset_to_span(100, "short");
        assert_eq!(span.offset(), 5);
        assert_eq!(span.len(), 1);
    }

    #[test]
    fn test_json_syntax_error_has_span() {
        let err = FileLoader::parse_str::<SJSON::Value>("{\"port\": }", FileFormat::Json)
            .unwrap_err();
        assert!(matches!(err, FileError::Parse { format: "JSON", .. }));
    }

    #[test]
    fn test_type_mismatch_names_nested_field() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Db {
            port: u16,
        }
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Cfg {
            database: Db,
        }

        let err = FileLoader::parse_str::<Cfg>(r#"{"database": {"port": "x"}}"#, FileFormat::Json)
            .unwrap_err();
        match err {
            FileError::TypeMismatch { field, .. } => assert_eq!(field, "database.port"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_extract_yaml_location() {
        assert_eq!(
            extract_yaml_location("mapping values are not allowed at line 3 column 7"),
            Some((3, 7))
        );
        assert_eq!(extract_yaml_location("no location here"), None);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_to_json_nested() {
        let table: TOML::Table = TOML::from_str("[server]\nport = 80\nratio = 0.5\n").unwrap();
        let json = toml_to_json(TOML::Value::Table(table));
        assert_eq!(json["server"]["port"], 80);
        assert_eq!(json["server"]["ratio"], 0.5);
    }
}
