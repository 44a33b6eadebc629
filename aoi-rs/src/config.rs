//! `aoi.toml` configuration file.
//!
//! ```toml
//! [runtime]
//! strictBrackets = false   # stray `[`, `]`, `;` are syntax errors when true
//! trimOutput = true        # trim whitespace around text results
//!
//! [vars]
//! prefix = "!"             # preset run variables, readable with `$get[prefix]`
//! limit = 3
//! ```
//!
//! Both tables are optional.  Unknown keys in `[runtime]` are ignored; a
//! `[vars]` entry that has no script value (a nested table) is skipped and
//! reported as a warning rather than failing the whole load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::script::value::Value;

// ── Public API ────────────────────────────────────────────────────────────────

/// Options that shape how scripts are parsed and how results come back.
/// Fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeOptions {
    /// Treat bare `[`, `]` and `;` outside a call as syntax errors.
    pub strict_brackets: bool,
    /// Trim surrounding whitespace from text results.
    pub trim_output: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            strict_brackets: false,
            trim_output: true,
        }
    }
}

/// A fatal error while loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A non-fatal problem with one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub message: String,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Parsed configuration: runtime options plus preset variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub runtime: RuntimeOptions,
    pub vars: BTreeMap<String, Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    runtime: RuntimeOptions,
    vars: toml::Table,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text.  Returns the config and any skipped entries.
    pub fn load_str(s: &str) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let raw: RawConfig = toml::from_str(s)?;
        let mut config = Config {
            runtime: raw.runtime,
            vars: BTreeMap::new(),
        };
        let mut warnings = Vec::new();
        for (key, value) in raw.vars {
            match to_value(value) {
                Some(v) => {
                    config.vars.insert(key, v);
                }
                None => warnings.push(ConfigWarning {
                    key: format!("vars.{key}"),
                    message: "tables cannot be used as script values".into(),
                }),
            }
        }
        Ok((config, warnings))
    }

    /// Read and parse the file at `path`.
    pub fn load_file(path: &Path) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_str(&text)
    }
}

fn to_value(value: toml::Value) -> Option<Value> {
    Some(match value {
        toml::Value::String(s) => Value::Str(s),
        toml::Value::Integer(n) => Value::Int(n),
        toml::Value::Float(x) => Value::Float(x),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::Str(d.to_string()),
        toml::Value::Array(items) => {
            Value::List(items.into_iter().map(to_value).collect::<Option<Vec<_>>>()?)
        }
        toml::Value::Table(_) => return None,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
