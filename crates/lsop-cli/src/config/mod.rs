//! Configuration management.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

/// CLI configuration, read from `config.toml`.
///
/// Command-line flags take precedence over every field here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// State file enabling the stateful scan (as `-s`).
    pub baseline: Option<String>,

    /// Directories to inventory in the stateful scan.
    #[serde(default)]
    pub scan_roots: Vec<String>,

    /// Descend into subdirectories (as `-r`).
    #[serde(default)]
    pub recursive: bool,

    /// Follow symlinks while scanning (as `-f`).
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Default output format.
    pub output_format: Option<OutputFormat>,

    /// Never print the table header (as `-H`).
    #[serde(default)]
    pub no_header: bool,
}

impl Config {
    /// Default config file path, if a config directory can be determined.
    pub fn path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lsop").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load the default config file. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load an explicitly named config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file '{}'", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
        Ok(config)
    }

    /// The state file path with `~` and `$VAR` expanded.
    pub fn baseline_path(&self) -> Result<Option<PathBuf>> {
        self.baseline.as_deref().map(expand).transpose()
    }

    /// Scan roots with `~` and `$VAR` expanded.
    pub fn scan_root_paths(&self) -> Result<Vec<PathBuf>> {
        self.scan_roots.iter().map(|r| expand(r)).collect()
    }
}

fn expand(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).with_context(|| format!("cannot expand path '{raw}'"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
