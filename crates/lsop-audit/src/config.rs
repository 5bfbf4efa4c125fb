//! Audit configuration threaded through every phase.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AuditError, Result};
use crate::registry::DEFAULT_BUCKETS;

/// Directories holding executables and shared libraries on common Linux
/// layouts. Scanned when a baseline run names no roots.
pub const DEFAULT_SCAN_PATHS: &[&str] = &[
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/usr/local/bin",
    "/usr/local/sbin",
    "/lib",
    "/lib64",
    "/usr/lib",
    "/usr/lib64",
    "/usr/local/lib",
    "/usr/libexec",
];

/// How the directory inventory walks its roots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Descend into subdirectories
    #[serde(default)]
    pub recursive: bool,
    /// Stat through symlinks instead of skipping them
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// Configuration for one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// State file backing the stateful mode; `None` runs the plain scan
    pub baseline: Option<PathBuf>,

    /// Rewrite the state file after the run
    #[serde(default = "default_true")]
    pub update_baseline: bool,

    /// Directories to inventory in the stateful mode
    #[serde(default = "default_scan_roots")]
    pub scan_roots: Vec<PathBuf>,

    #[serde(default)]
    pub scan: ScanOptions,

    /// Buckets per registry index
    #[serde(default = "default_buckets")]
    pub buckets: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            baseline: None,
            update_baseline: true,
            scan_roots: default_scan_roots(),
            scan: ScanOptions::default(),
            buckets: DEFAULT_BUCKETS,
        }
    }
}

impl AuditConfig {
    /// Stateful configuration backed by `baseline`, scanning `roots`.
    #[must_use]
    pub fn stateful(baseline: impl Into<PathBuf>, roots: Vec<PathBuf>) -> Self {
        Self {
            baseline: Some(baseline.into()),
            scan_roots: roots,
            ..Self::default()
        }
    }

    /// True when a state file is in use.
    #[must_use]
    pub const fn is_stateful(&self) -> bool {
        self.baseline.is_some()
    }

    /// Reject settings no run can work with.
    pub fn validate(&self) -> Result<()> {
        if self.buckets == 0 {
            return Err(AuditError::Config("bucket count must be positive".into()));
        }
        // Nothing would be found, so every tracked file would read as missing.
        if self.is_stateful() && self.scan_roots.is_empty() {
            return Err(AuditError::Config(
                "stateful scan needs at least one scan root".into(),
            ));
        }
        Ok(())
    }
}

const fn default_true() -> bool {
    true
}

const fn default_buckets() -> usize {
    DEFAULT_BUCKETS
}

fn default_scan_roots() -> Vec<PathBuf> {
    DEFAULT_SCAN_PATHS.iter().map(PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuditConfig::default();
        assert!(!config.is_stateful());
        assert!(config.update_baseline);
        assert_eq!(config.buckets, 32768);
        assert!(config.scan_roots.contains(&PathBuf::from("/usr/lib")));
        assert!(!config.scan.recursive);
        assert!(!config.scan.follow_symlinks);
    }

    #[test]
    fn test_config_serialization() {
        let config = AuditConfig::stateful("/var/db/lsop.state", vec![PathBuf::from("/opt")]);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AuditConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.baseline, config.baseline);
        assert_eq!(parsed.scan_roots, vec![PathBuf::from("/opt")]);
    }

    #[test]
    fn validate_rejects_unusable_settings() {
        assert!(AuditConfig::default().validate().is_ok());
        assert!(AuditConfig::stateful("/tmp/s", Vec::new()).validate().is_err());
        let config = AuditConfig {
            buckets: 0,
            ..AuditConfig::default()
        };
        assert!(matches!(config.validate(), Err(AuditError::Config(_))));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: AuditConfig = serde_json::from_str(r#"{"baseline": null}"#).unwrap();
        assert!(parsed.update_baseline);
        assert_eq!(parsed.buckets, DEFAULT_BUCKETS);
        assert_eq!(parsed.scan_roots.len(), DEFAULT_SCAN_PATHS.len());
    }
}
