//! Process and memory-mapping types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::file::FileIdentity;
use super::severity::Severity;

/// A point-in-time view of one running process.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    /// Process ID
    pub pid: i32,
    /// Container (pid namespace) id, 0 for the host
    pub jid: u64,
    /// Process name (comm)
    pub name: String,
    /// Path to the executable, if it could be resolved
    pub exe_path: Option<String>,
    /// Memory regions, or why they could not be read
    pub regions: Result<Vec<MemoryRegion>, String>,
}

impl ProcessSnapshot {
    /// Executable path, or `(comm)` when it cannot be resolved.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.exe_path
            .clone()
            .unwrap_or_else(|| format!("({})", self.name))
    }
}

/// What backs a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    /// Mapped from a file (vnode)
    File,
    /// Anonymous memory: heap, stack, private allocations
    Anonymous,
    /// Kernel-provided pages: vdso, vvar, vsyscall
    Kernel,
}

/// Memory protection bits of a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protection {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl Protection {
    pub const READ_EXEC: Self = Self {
        read: true,
        write: false,
        execute: true,
    };

    /// Readable and executable, regardless of the write bit.
    #[must_use]
    pub const fn is_read_execute(self) -> bool {
        self.read && self.execute
    }
}

/// One memory region of a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub kind: RegionKind,
    pub protection: Protection,
    /// Mapped shared rather than copy-on-write
    pub shared: bool,
    /// Identity of the backing file
    pub identity: FileIdentity,
    /// Backing path; empty once the file is gone
    pub path: PathBuf,
}

impl MemoryRegion {
    /// A read+execute region backed by `path`.
    #[must_use]
    pub fn file_backed(identity: FileIdentity, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RegionKind::File,
            protection: Protection::READ_EXEC,
            shared: false,
            identity,
            path: path.into(),
        }
    }

    /// The kernel no longer reports a backing path.
    #[must_use]
    pub fn path_gone(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    /// File-backed and read+execute: code is being executed from this file.
    #[must_use]
    pub fn qualifies(&self) -> bool {
        self.kind == RegionKind::File && self.protection.is_read_execute()
    }
}

/// Per-process counts of mapping findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTally {
    /// Regions that were checked
    pub qualifying: u32,
    pub errors: u32,
    pub mismatched: u32,
    pub missing: u32,
    /// Missing mappings suppressed by a whitelist entry
    pub suppressed: u32,
    /// The region list itself could not be read
    pub enumeration_failed: bool,
    /// The executable path could not be resolved
    pub unresolved_exe: bool,
}

impl MappingTally {
    /// Record one mapping's finding.
    pub fn add(&mut self, severity: Severity) {
        self.qualifying += 1;
        match severity {
            Severity::Okay => {}
            Severity::Err => self.errors += 1,
            Severity::Mismatch => self.mismatched += 1,
            Severity::Missing => self.missing += 1,
        }
    }

    /// Maximum severity across the counted findings.
    #[must_use]
    pub fn severity(&self) -> Severity {
        let err = self.errors > 0 || self.enumeration_failed || self.unresolved_exe;
        Severity::worst(
            [
                (err, Severity::Err),
                (self.mismatched > 0, Severity::Mismatch),
                (self.missing > 0, Severity::Missing),
            ]
            .into_iter()
            .filter_map(|(hit, s)| hit.then_some(s)),
        )
    }
}

/// Classification of one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessVerdict {
    pub pid: i32,
    pub jid: u64,
    /// Executable path or `(comm)`
    pub command: String,
    /// Executable path used for whitelist matching
    pub exe_path: Option<String>,
    pub tally: MappingTally,
    pub severity: Severity,
}

impl ProcessVerdict {
    /// Recompute `severity` after the tally changed.
    pub fn refresh(&mut self) {
        self.severity = self.tally.severity();
    }
}
