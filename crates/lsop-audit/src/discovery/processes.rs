//! Process and memory-mapping discovery via the `/proc` filesystem.

use procfs::process::{MMPermissions, MMapPath, MemoryMap, Process};
use procfs::ProcError;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{AuditError, Result};
use crate::types::{FileIdentity, MemoryRegion, ProcessSnapshot, Protection, RegionKind};

/// Marker the kernel appends to paths whose file has been unlinked.
const DELETED_SUFFIX: &str = " (deleted)";

/// A finite, single-pass sequence of live process snapshots.
pub trait ProcessSource {
    /// Start one pass over the process table.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Procfs` if the process table cannot be read at
    /// all. Individual processes that vanish mid-scan are skipped.
    fn processes(&self) -> Result<Box<dyn Iterator<Item = ProcessSnapshot> + '_>>;
}

/// Live processes read from `/proc` with the `procfs` crate.
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    own_pid_ns: Option<u64>,
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            own_pid_ns: pid_namespace("self"),
        }
    }

    /// Pid namespace inode, or 0 when it is ours or unreadable.
    fn container_id(&self, pid: i32) -> u64 {
        match pid_namespace(&pid.to_string()) {
            Some(ns) if Some(ns) != self.own_pid_ns => ns,
            _ => 0,
        }
    }

    fn snapshot(&self, proc: &Process) -> Option<ProcessSnapshot> {
        let stat = match proc.stat() {
            Ok(s) => s,
            Err(e) => {
                debug!(pid = proc.pid(), error = %e, "skipping process");
                return None;
            }
        };

        // Exe path may fail for kernel threads or permission issues
        let exe_path = proc.exe().ok().map(|p| {
            let p = p.to_string_lossy();
            p.strip_suffix(DELETED_SUFFIX).unwrap_or(&*p).to_string()
        });

        let regions = match proc.maps() {
            Ok(maps) => Ok(maps.into_iter().map(region_from_map).collect()),
            Err(ProcError::NotFound(_)) => {
                debug!(pid = stat.pid, "process exited during scan");
                return None;
            }
            Err(e) => Err(e.to_string()),
        };

        Some(ProcessSnapshot {
            pid: stat.pid,
            jid: self.container_id(stat.pid),
            name: stat.comm,
            exe_path,
            regions,
        })
    }
}

impl ProcessSource for ProcfsSource {
    fn processes(&self) -> Result<Box<dyn Iterator<Item = ProcessSnapshot> + '_>> {
        let all =
            procfs::process::all_processes().map_err(|e| AuditError::Procfs(e.to_string()))?;

        Ok(Box::new(all.filter_map(move |entry| match entry {
            Ok(proc) => self.snapshot(&proc),
            Err(e) => {
                debug!(error = %e, "skipping inaccessible process");
                None
            }
        })))
    }
}

/// Inode of `/proc/<who>/ns/pid`.
fn pid_namespace(who: &str) -> Option<u64> {
    std::fs::metadata(format!("/proc/{who}/ns/pid"))
        .ok()
        .map(|m| m.ino())
}

/// Encode a (major, minor) pair the way glibc `makedev` does, matching the
/// `st_dev` values `stat` reports.
#[must_use]
pub fn encode_dev(major: u32, minor: u32) -> u64 {
    let (major, minor) = (u64::from(major), u64::from(minor));
    ((major & 0xffff_f000) << 32)
        | ((major & 0x0000_0fff) << 8)
        | ((minor & 0xffff_ff00) << 12)
        | (minor & 0x0000_00ff)
}

/// Mapping path as the kernel reports it, kept byte-exact. Empty once the
/// kernel marks the file deleted.
fn backing_path(path: PathBuf) -> PathBuf {
    if path.as_os_str().as_bytes().ends_with(DELETED_SUFFIX.as_bytes()) {
        PathBuf::new()
    } else {
        path
    }
}

/// Convert one `/proc/<pid>/maps` line to a region.
fn region_from_map(map: MemoryMap) -> MemoryRegion {
    let (kind, path) = match map.pathname {
        MMapPath::Path(p) => (RegionKind::File, backing_path(p)),
        MMapPath::Vdso | MMapPath::Vvar | MMapPath::Vsyscall => (RegionKind::Kernel, PathBuf::new()),
        _ => (RegionKind::Anonymous, PathBuf::new()),
    };

    let (major, minor) = map.dev;
    let device_id = encode_dev(
        u32::try_from(major).unwrap_or_default(),
        u32::try_from(minor).unwrap_or_default(),
    );

    MemoryRegion {
        kind,
        protection: Protection {
            read: map.perms.contains(MMPermissions::READ),
            write: map.perms.contains(MMPermissions::WRITE),
            execute: map.perms.contains(MMPermissions::EXECUTE),
        },
        shared: map.perms.contains(MMPermissions::SHARED),
        identity: FileIdentity::new(device_id, map.inode),
        path,
    }
}
