//! This module defines the configuration structures and the loading logic for wikisplice.
//! Configuration lives in `.wikisplice.toml`, discovered by walking up from the working
//! directory, and only affects the command-line tool.

use crate::element::DEFAULT_LIST_MARKERS;
use crate::grammar::ListGrammar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the configuration file searched for during discovery
pub const CONFIG_FILE: &str = ".wikisplice.toml";

/// Upper bound on directories visited while searching upward
const MAX_DEPTH: usize = 100;

const GLOBAL_KEYS: &[&str] = &["default-patterns", "output-format"];

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable, optionally colored
    #[default]
    Text,
    /// One pretty-printed JSON document
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

/// Normalizes configuration keys to lowercase kebab-case
pub fn normalize_key(key: &str) -> String {
    key.replace('_', "-").to_ascii_lowercase()
}

/// Represents the complete configuration loaded from .wikisplice.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
}

/// Global configuration options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct GlobalConfig {
    /// List markers searched when a command is given no `--pattern`
    #[serde(alias = "default_patterns")]
    pub default_patterns: Vec<String>,

    /// Output format used when `--output-format` is not passed
    #[serde(alias = "output_format")]
    pub output_format: OutputFormat,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_patterns: DEFAULT_LIST_MARKERS.iter().map(|m| m.to_string()).collect(),
            output_format: OutputFormat::default(),
        }
    }
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file at {path}: {source}")]
    IoError { source: io::Error, path: String },

    /// Failed to parse or validate the configuration content
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

impl Config {
    /// Parse configuration from TOML text
    ///
    /// Unknown keys in `[global]` are reported with a warning and ignored.
    /// Every default pattern must compile as a list marker.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        if let Some(global) = table.get("global").and_then(toml::Value::as_table) {
            for key in global.keys() {
                if !GLOBAL_KEYS.contains(&normalize_key(key).as_str()) {
                    log::warn!("[wikisplice-config] Ignoring unknown key in [global]: {key}");
                }
            }
        }

        let config =
            Config::deserialize(toml::Value::Table(table)).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        for pattern in &config.global.default_patterns {
            ListGrammar::compile(pattern).map_err(|e| ConfigError::ParseError(format!("default-patterns: {e}")))?;
        }
        Ok(config)
    }

    /// Read and parse one configuration file
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            source,
            path: path.display().to_string(),
        })?;
        log::debug!("[wikisplice-config] Loading config file: {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Find the nearest configuration file at or above `start_dir`
    ///
    /// The search stops at the first directory containing `.git`, which is
    /// still searched itself.
    pub fn discover_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current_dir = start_dir.to_path_buf();

        for _ in 0..MAX_DEPTH {
            log::debug!("[wikisplice-config] Searching for config in: {}", current_dir.display());

            let candidate = current_dir.join(CONFIG_FILE);
            if candidate.is_file() {
                log::debug!("[wikisplice-config] Found config file: {}", candidate.display());
                return Some(candidate);
            }

            if current_dir.join(".git").exists() {
                log::debug!("[wikisplice-config] Stopping at .git directory");
                return None;
            }

            if !current_dir.pop() {
                log::debug!("[wikisplice-config] Reached filesystem root");
                return None;
            }
        }

        log::debug!("[wikisplice-config] Maximum traversal depth reached");
        None
    }

    /// Load configuration for a command run in the current directory
    ///
    /// An explicit `config_path` always wins. Otherwise discovery runs unless
    /// `skip_discovery` is set; with nothing found, defaults apply.
    pub fn load(config_path: Option<&str>, skip_discovery: bool) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|source| ConfigError::IoError {
            source,
            path: ".".to_string(),
        })?;
        Self::load_from(&start_dir, config_path, skip_discovery)
    }

    /// [`Config::load`] with an explicit starting directory
    #[doc(hidden)]
    pub fn load_from(start_dir: &Path, config_path: Option<&str>, skip_discovery: bool) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            log::debug!("[wikisplice-config] Explicit config_path provided: {path}");
            return Self::load_file(Path::new(path));
        }
        if skip_discovery {
            log::debug!("[wikisplice-config] Skipping auto-discovery due to --no-config flag");
            return Ok(Self::default());
        }

        match Self::discover_from(start_dir) {
            Some(path) => Self::load_file(&path),
            None => {
                log::debug!("[wikisplice-config] No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}
