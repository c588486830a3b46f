//! Autosave configuration
//!
//! Settings are read from a keyed table with typed defaults. Invalid values
//! never stop the scheduler: a wrong type falls back to the default and an
//! out-of-range number is clamped to the nearest bound. Every fallback is
//! reported as a [`ConfigWarning`] so the caller can surface it once.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use toml::{Table, Value};
use tracing::debug;

/// Table name holding autosave settings in a config file
pub const NAMESPACE: &str = "autosave";

pub const MIN_DELAY_MS: u64 = 50;
pub const MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_DELAY_MS: u64 = 1_000;

pub const MIN_FILE_SIZE_KB: u64 = 1;
pub const MAX_FILE_SIZE_KB: u64 = 102_400;
pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 1_024;

const KNOWN_KEYS: &[&str] = &[
    "enabled",
    "delay",
    "save_on_every_change",
    "save_untitled",
    "file_types",
    "exclude_file_types",
    "max_file_size_kb",
    "show_notifications",
    "show_status_bar",
    "debug_logging",
];

/// Immutable, validated configuration snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// Global on/off switch
    pub enabled: bool,
    /// Debounce delay in milliseconds, always within [50, 10000]
    pub delay_ms: u64,
    /// Skip debouncing and save on every change
    pub save_on_every_change: bool,
    /// Allow documents that have never been given a location
    pub save_untitled: bool,
    /// Allow-list of file-type tags (empty = all types)
    pub file_types: Vec<String>,
    /// Deny-list of file-type tags, checked before the allow-list
    pub exclude_file_types: Vec<String>,
    /// Largest document eligible for auto-save, always within [1, 102400]
    pub max_file_size_kb: u64,
    pub show_notifications: bool,
    pub show_status_bar: bool,
    pub debug_logging: bool,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: DEFAULT_DELAY_MS,
            save_on_every_change: false,
            save_untitled: false,
            file_types: Vec::new(),
            exclude_file_types: Vec::new(),
            max_file_size_kb: DEFAULT_MAX_FILE_SIZE_KB,
            show_notifications: true,
            show_status_bar: true,
            debug_logging: false,
        }
    }
}

/// A setting that could not be used as given
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigWarning {
    #[error("{key} = {value} is out of range, using {clamped}")]
    OutOfRange {
        key: &'static str,
        value: i64,
        clamped: u64,
    },

    #[error("{key} must be {expected}, using the default")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },

    #[error("{key}[{index}] is not a string and was ignored")]
    InvalidEntry { key: &'static str, index: usize },
}

/// Failure to read a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl AutosaveConfig {
    /// Build a configuration from a settings table
    ///
    /// Missing keys take their defaults. Returns the validated config along
    /// with every fallback that was applied.
    pub fn from_table(table: &Table) -> (Self, Vec<ConfigWarning>) {
        let defaults = Self::default();
        let mut warnings = Vec::new();

        for key in table.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                debug!("Ignoring unknown autosave setting: {}", key);
            }
        }

        let config = Self {
            enabled: read_bool(table, "enabled", defaults.enabled, &mut warnings),
            delay_ms: read_clamped(
                table,
                "delay",
                defaults.delay_ms,
                MIN_DELAY_MS,
                MAX_DELAY_MS,
                &mut warnings,
            ),
            save_on_every_change: read_bool(
                table,
                "save_on_every_change",
                defaults.save_on_every_change,
                &mut warnings,
            ),
            save_untitled: read_bool(table, "save_untitled", defaults.save_untitled, &mut warnings),
            file_types: read_type_list(table, "file_types", &mut warnings),
            exclude_file_types: read_type_list(table, "exclude_file_types", &mut warnings),
            max_file_size_kb: read_clamped(
                table,
                "max_file_size_kb",
                defaults.max_file_size_kb,
                MIN_FILE_SIZE_KB,
                MAX_FILE_SIZE_KB,
                &mut warnings,
            ),
            show_notifications: read_bool(
                table,
                "show_notifications",
                defaults.show_notifications,
                &mut warnings,
            ),
            show_status_bar: read_bool(
                table,
                "show_status_bar",
                defaults.show_status_bar,
                &mut warnings,
            ),
            debug_logging: read_bool(table, "debug_logging", defaults.debug_logging, &mut warnings),
        };

        (config, warnings)
    }

    /// Load the `[autosave]` table of a TOML file
    ///
    /// A missing file yields the defaults with no warnings.
    pub fn load(path: &Path) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let table = read_table(path)?;
        Ok(Self::from_table(&table))
    }

    /// Debounce delay as a duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Read the `[autosave]` settings table from a TOML file
///
/// Returns an empty table when the file or the section does not exist.
pub fn read_table(path: &Path) -> Result<Table, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Table::new()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut root: Table = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match root.remove(NAMESPACE) {
        Some(Value::Table(table)) => Ok(table),
        _ => Ok(Table::new()),
    }
}

/// Commented example configuration file
pub fn example_config() -> &'static str {
    r#"# Autosave configuration

[autosave]
# Master switch
enabled = true

# Quiet period after the last edit before saving (50-10000 ms)
delay = 1000

# Save immediately on every change, bypassing the delay
save_on_every_change = false

# Auto-save documents that have never been saved to a location
save_untitled = false

# Only auto-save these file types (empty = all)
file_types = []

# Never auto-save these file types (checked first)
exclude_file_types = ["log", "tmp"]

# Skip documents larger than this (1-102400 KB)
max_file_size_kb = 1024

show_notifications = true
show_status_bar = true
debug_logging = false
"#
}

fn read_bool(table: &Table, key: &'static str, default: bool, warnings: &mut Vec<ConfigWarning>) -> bool {
    match table.get(key) {
        None => default,
        Some(Value::Boolean(b)) => *b,
        Some(_) => {
            warnings.push(ConfigWarning::WrongType {
                key,
                expected: "a boolean",
            });
            default
        }
    }
}

fn read_clamped(
    table: &Table,
    key: &'static str,
    default: u64,
    min: u64,
    max: u64,
    warnings: &mut Vec<ConfigWarning>,
) -> u64 {
    let value = match table.get(key) {
        None => return default,
        Some(Value::Integer(n)) => *n,
        Some(_) => {
            warnings.push(ConfigWarning::WrongType {
                key,
                expected: "an integer",
            });
            return default;
        }
    };

    if value < min as i64 {
        warnings.push(ConfigWarning::OutOfRange {
            key,
            value,
            clamped: min,
        });
        min
    } else if value > max as i64 {
        warnings.push(ConfigWarning::OutOfRange {
            key,
            value,
            clamped: max,
        });
        max
    } else {
        value as u64
    }
}

fn read_type_list(table: &Table, key: &'static str, warnings: &mut Vec<ConfigWarning>) -> Vec<String> {
    let items = match table.get(key) {
        None => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            warnings.push(ConfigWarning::WrongType {
                key,
                expected: "an array of strings",
            });
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Value::String(s) => normalize_type_tag(s),
            _ => {
                warnings.push(ConfigWarning::InvalidEntry { key, index });
                None
            }
        })
        .collect()
}

/// Normalize a configured type tag: `".RS "` becomes `"rs"`
fn normalize_type_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().trim_start_matches('.');
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_ascii_lowercase())
    }
}
