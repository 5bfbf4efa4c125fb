//! Error types for lsop-audit.

use thiserror::Error;

/// Result type alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Errors that abort an audit run.
///
/// Per-object failures (a single `stat`, one unreadable directory, one
/// process whose maps cannot be read) are not represented here; they are
/// counted and logged, and surface as an `Err` severity instead.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Reading or writing a file failed.
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// `/proc` could not be enumerated.
    #[error("process enumeration failed: {0}")]
    Procfs(String),

    /// A baseline line did not match `fsid:inode:mtime:path`.
    #[error("cannot read state file '{path}' (line {line}): {reason}")]
    BaselineFormat {
        path: String,
        line: usize,
        reason: String,
    },

    /// A whitelist line did not match `path<TAB>count`.
    #[error("cannot read whitelist '{source_name}' (line {line}): {reason}")]
    WhitelistFormat {
        source_name: String,
        line: usize,
        reason: String,
    },

    /// None of the scan roots could be traversed.
    #[error("scan failed: {0}")]
    Scan(String),

    /// A process with missing mappings has no resolvable executable path,
    /// so no whitelist line can be written for it.
    #[error("cannot resolve executable path of pid {pid}")]
    UnresolvedExecutable { pid: i32 },

    /// The system random source was unavailable for hash seeding.
    #[error("cannot seed hash table from system random source")]
    Random,

    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl AuditError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the underlying cause is a missing file.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
