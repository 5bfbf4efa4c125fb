//! Reconciliation -- classify each process's executable mappings against
//! the identity registry and the filesystem.

use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::registry::IdentityRegistry;
use crate::types::{FileIdentity, MappingTally, MemoryRegion, ProcessSnapshot, ProcessVerdict, Severity};

/// Resolves a path to the identity currently on disk.
pub trait FileStat {
    /// `stat` the path, following symlinks.
    fn identity(&self, path: &Path) -> io::Result<FileIdentity>;
}

/// `FileStat` backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemStat;

impl FileStat for SystemStat {
    fn identity(&self, path: &Path) -> io::Result<FileIdentity> {
        std::fs::metadata(path).map(|m| FileIdentity::from_metadata(&m))
    }
}

/// Classifies processes against a registry populated by the scan phase.
///
/// With an empty registry every lookup misses and classification falls back
/// to checking each mapping's backing path directly.
pub struct Reconciler<'a, S: FileStat> {
    registry: &'a mut IdentityRegistry,
    stat: &'a S,
}

impl<'a, S: FileStat> Reconciler<'a, S> {
    pub fn new(registry: &'a mut IdentityRegistry, stat: &'a S) -> Self {
        Self { registry, stat }
    }

    /// Classify one qualifying mapping of process `pid`.
    pub fn classify_region(&mut self, pid: i32, region: &MemoryRegion) -> Severity {
        if let Some(id) = self.registry.find_id_by_identity(region.identity) {
            self.registry.mark_referenced(id);
            let Some(record) = self.registry.get(id) else {
                return Severity::Okay;
            };
            if record.replacement.is_some() {
                info!(pid, path = %record.path.display(), "using replaced file");
                return Severity::Mismatch;
            }
            if record.times_found == 0 {
                info!(pid, path = %record.path.display(), "using missing file");
                return Severity::Missing;
            }
            return Severity::Okay;
        }

        if region.path_gone() {
            debug!(pid, identity = %region.identity, "backing file gone");
            return Severity::Missing;
        }

        match self.stat.identity(&region.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(pid, path = %region.path.display(), "backing file missing");
                Severity::Missing
            }
            Err(e) => {
                warn!(pid, path = %region.path.display(), error = %e, "cannot stat file");
                Severity::Err
            }
            // Normally unreachable: the kernel drops the path once the file
            // is deleted or replaced.
            Ok(on_disk) if on_disk != region.identity => {
                info!(
                    pid,
                    path = %region.path.display(),
                    mapped = %region.identity,
                    on_disk = %on_disk,
                    "mapping does not match file on disk"
                );
                Severity::Mismatch
            }
            Ok(_) => Severity::Okay,
        }
    }

    /// Classify a whole process: the worst finding across its qualifying
    /// mappings, `Okay` if it has none.
    pub fn classify(&mut self, process: &ProcessSnapshot) -> ProcessVerdict {
        let mut tally = MappingTally::default();
        match &process.regions {
            Ok(regions) => {
                for region in regions.iter().filter(|r| r.qualifies()) {
                    tally.add(self.classify_region(process.pid, region));
                }
            }
            Err(e) => {
                warn!(pid = process.pid, error = %e, "cannot read memory mappings");
                tally.enumeration_failed = true;
            }
        }

        if process.exe_path.is_none() && tally.qualifying > 0 {
            debug!(pid = process.pid, "cannot resolve executable path");
            tally.unresolved_exe = true;
        }

        ProcessVerdict {
            pid: process.pid,
            jid: process.jid,
            command: process.display_name(),
            exe_path: process.exe_path.clone(),
            severity: tally.severity(),
            tally,
        }
    }
}
