#![no_main]

use arbitrary::Arbitrary;
use cfgwatch::{FileFormat, FileLoader};
use libfuzzer_sys::fuzz_target;
use serde::Deserialize;
use std::collections::HashMap;

#[allow(dead_code)]
#[derive(Deserialize)]
struct FuzzConfig {
    #[serde(default)]
    string_field: Option<String>,
    #[serde(default)]
    int_field: Option<i64>,
    #[serde(default)]
    bool_field: Option<bool>,
    #[serde(default)]
    nested: Option<HashMap<String, String>>,
}

#[derive(Arbitrary, Debug)]
enum Format {
    Json,
    Toml,
    Yaml,
}

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    format: Format,
    content: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let format = match input.format {
        Format::Json => FileFormat::Json,
        Format::Toml => FileFormat::Toml,
        Format::Yaml => FileFormat::Yaml,
    };

    // Loading returns Result and builds span diagnostics, never panics
    let _ = FileLoader::parse_str::<FuzzConfig>(input.content, format);
    let _ = FileLoader::parse_str::<serde_json::Value>(input.content, format);
});
