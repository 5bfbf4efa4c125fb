//! Tracked on-disk objects.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use crate::registry::RecordId;

/// Unique file identity on disk (device + inode).
///
/// Stable across renames; a file replaced by new content at the same path
/// gets a new identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    pub device_id: u64,
    pub inode: u64,
}

impl FileIdentity {
    #[must_use]
    pub const fn new(device_id: u64, inode: u64) -> Self {
        Self { device_id, inode }
    }

    /// Identity of the file described by `meta`.
    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            device_id: meta.dev(),
            inode: meta.ino(),
        }
    }

    /// Raw bytes fed to the identity hash.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.device_id.to_le_bytes());
        out[8..].copy_from_slice(&self.inode.to_le_bytes());
        out
    }
}

impl std::fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device_id, self.inode)
    }
}

/// Where a record came from. Diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    /// Loaded from a previous run's state file
    Baseline,
    /// Observed while walking scan roots during this run
    Scan,
}

/// A file tracked by the identity registry.
///
/// Only `replacement`, `times_found` and `times_referenced` change after
/// insertion, and only through the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Device + inode at observation time
    pub identity: FileIdentity,
    /// Absolute canonical path, byte-exact
    pub path: PathBuf,
    /// Modification time, seconds since the epoch
    pub mtime: i64,
    /// Provenance
    pub source: RecordSource,
    /// Newer record seen at the same path with a different identity
    #[serde(skip)]
    pub replacement: Option<RecordId>,
    /// Directory-scan observations matching this identity
    pub times_found: u32,
    /// Process mappings resolved to this identity
    pub times_referenced: u32,
}

impl FileRecord {
    #[must_use]
    pub fn new(
        identity: FileIdentity,
        path: impl Into<PathBuf>,
        mtime: i64,
        source: RecordSource,
    ) -> Self {
        Self {
            identity,
            path: path.into(),
            mtime,
            source,
            replacement: None,
            times_found: 0,
            times_referenced: 0,
        }
    }

    /// Modification time as a UTC timestamp.
    #[must_use]
    pub fn modified_at(&self) -> DateTime<Utc> {
        timestamp_to_utc(self.mtime)
    }
}

/// Convert a Unix timestamp (seconds) to `DateTime<Utc>`.
pub(crate) fn timestamp_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
