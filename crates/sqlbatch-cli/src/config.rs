//! Run configuration: command line, environment and config file

use anyhow::{Context, Result};
use serde::Deserialize;
use sqlbatch_query::DEFAULT_BATCH_SIZE;
use std::path::{Path, PathBuf};

/// Contents of `config.toml`
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub input: Option<PathBuf>,
    pub batch_size: Option<usize>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// `<config_dir>/sqlbatch/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sqlbatch").join("config.toml"))
    }

    /// Load an explicitly named file, or the default file when it exists
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "using default config file");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub url: Option<String>,
    pub input: Option<PathBuf>,
    pub batch_size: Option<usize>,
}

/// Settings for one run after merging every source
///
/// A missing URL or input stays `None`; the executor reports it in the
/// configure phase like any other configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub url: Option<String>,
    pub input: Option<PathBuf>,
    pub batch_size: usize,
}

impl RunConfig {
    /// Merge settings: command line and environment first, then the config file, then defaults
    pub fn resolve(overrides: Overrides, file: ConfigFile) -> Self {
        Self {
            url: overrides.url.or(file.url),
            input: overrides.input.or(file.input),
            batch_size: overrides
                .batch_size
                .or(file.batch_size)
                .unwrap_or(DEFAULT_BATCH_SIZE),
        }
    }
}

/// Where a missing setting can be supplied
pub fn setting_hint(setting: &str) -> &'static str {
    match setting {
        "connection url" => "pass --url, set SQLBATCH_URL or add `url` to the config file",
        "input file" => "pass --input, set SQLBATCH_INPUT or add `input` to the config file",
        _ => "set it on the command line or in the config file",
    }
}
