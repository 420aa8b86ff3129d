//! Configuration for the language-intelligence backend.
//!
//! Layered settings: defaults, then a TOML file, then environment variables.
//! Environment variables use the `APEXSENSE_` prefix with double underscores
//! for nesting: `APEXSENSE_VALIDATION__API_VERSION=60` sets
//! `validation.api_version`.
//!
//! Engine budgets (immediate-tier deadline, artifact limits) are engineering
//! constants in [`crate::validation`], not configuration.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = "apexsense.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the precompiled stdlib snapshot.
    #[serde(default = "default_stdlib_path")]
    pub stdlib_path: PathBuf,

    /// Project namespace applied to collected type symbols.
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ValidationConfig {
    /// Language API version used by version-gated rules.
    #[serde(default = "default_api_version")]
    pub api_version: u32,

    /// Enable version-specific identifier and modifier rules.
    #[serde(default = "default_true")]
    pub enable_version_specific: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level (error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides, e.g. `graph = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_stdlib_path() -> PathBuf {
    PathBuf::from(".apexsense/stdlib.bin")
}
fn default_api_version() -> u32 {
    64
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            stdlib_path: default_stdlib_path(),
            namespace: None,
            validation: ValidationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            enable_version_specific: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from the default file location plus the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(Path::new(SETTINGS_FILE))
    }

    /// Load settings layered over `path`. Missing files are fine; defaults
    /// apply.
    pub fn load_from(path: &Path) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("APEXSENSE_").split("__"))
            .extract()
    }
}
