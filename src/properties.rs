//! Segment property bag.
//!
//! Properties come straight from a segment's `[segments.properties]` table.
//! Getters never fail: a missing key or a value of the wrong type yields the
//! caller's default.

use std::collections::BTreeMap;

use serde::Deserialize;
use toml::{Table, Value};

pub const FETCH_STATUS: &str = "fetch_status";
pub const NATIVE_FALLBACK: &str = "native_fallback";
pub const EXCLUDED_FOLDERS: &str = "excluded_folders";
pub const STATUS_FORMATS: &str = "status_formats";
pub const DISPLAY_MODE: &str = "display_mode";
pub const FETCH_CONTEXT: &str = "fetch_context";
pub const READ_CONFIG_FILE: &str = "read_config_file";
pub const EXTENSIONS: &str = "extensions";
pub const HTTP_TIMEOUT: &str = "http_timeout";
pub const CACHE_DURATION: &str = "cache_duration";

/// Default HTTP timeout in milliseconds.
pub const DEFAULT_HTTP_TIMEOUT: i64 = 20;
/// Default cache duration in minutes.
pub const DEFAULT_CACHE_DURATION: i64 = 10;

/// Read-only configuration handed to a segment at construction.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Properties(Table);

impl Properties {
    pub fn new(table: Table) -> Self {
        Self(table)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.0.get(key) {
            Some(Value::Integer(i)) => *i,
            // Float values in TOML are truncated, matching `5.0` to `5`
            Some(Value::Float(f)) => *f as i64,
            _ => default,
        }
    }

    /// String array. Non-string elements are skipped.
    pub fn get_string_list(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.0.get(key).and_then(Value::as_array) {
            Some(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Table of strings. Non-string values are skipped.
    pub fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        self.0
            .get(key)
            .and_then(Value::as_table)
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}
