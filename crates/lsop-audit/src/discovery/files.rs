//! Directory inventory -- walk scan roots and feed regular files into the
//! identity registry.

use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{info, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanOptions;
use crate::error::{AuditError, Result};
use crate::registry::IdentityRegistry;
use crate::types::{FileIdentity, FileRecord, RecordSource, ScanStats};

/// Walk `roots` and observe every regular file found.
///
/// Without `follow_symlinks` symlinks are skipped: they mostly point at
/// files reached anyway by the normal walk. With it, symlink loops are
/// reported and skipped. A root that is itself a regular file is observed
/// directly.
///
/// Per-entry failures are logged and counted; the walk carries on with the
/// siblings.
///
/// # Errors
///
/// Returns `AuditError::Scan` if roots were given but none of them could be
/// traversed.
pub fn scan_roots(
    registry: &mut IdentityRegistry,
    roots: &[PathBuf],
    options: ScanOptions,
) -> Result<ScanStats> {
    let mut stats = ScanStats::default();

    for root in roots {
        info!(root = %root.display(), "traversing");
        if scan_root(registry, root, options, &mut stats) {
            stats.roots_scanned += 1;
        }
    }

    if !roots.is_empty() && stats.roots_scanned == 0 {
        return Err(AuditError::Scan(format!(
            "none of {} scan root(s) could be traversed",
            roots.len()
        )));
    }

    info!(
        roots = stats.roots_scanned,
        examined = stats.examined,
        tracked = stats.tracked,
        known = stats.known,
        replaced = stats.replaced,
        errors = stats.errors,
        "scan complete"
    );
    Ok(stats)
}

/// Walk one root. Returns whether the root itself could be opened.
fn scan_root(
    registry: &mut IdentityRegistry,
    root: &Path,
    options: ScanOptions,
    stats: &mut ScanStats,
) -> bool {
    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(options.follow_symlinks);

    let mut root_ok = true;
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                if e.depth() == 0 {
                    root_ok = false;
                }
                let path = e.path().map_or_else(|| root.display().to_string(), |p| p.display().to_string());
                warn!(path = %path, error = %e, "cannot scan");
                stats.errors += 1;
                continue;
            }
        };

        trace!(path = %entry.path().display(), "examining object");
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            stats.skipped += 1;
            continue;
        }

        match file_record(&entry) {
            Ok(record) => {
                stats.examined += 1;
                let replaces = registry.find_by_path(&record.path).is_some_and(|prev| {
                    prev.identity != record.identity || prev.mtime != record.mtime
                });
                if registry.observe(record) {
                    stats.tracked += 1;
                    if replaces {
                        stats.replaced += 1;
                    }
                } else {
                    stats.known += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot examine file");
                stats.errors += 1;
            }
        }
    }
    root_ok
}

/// Build a scan record from a walk entry: canonical path, identity, mtime.
///
/// Paths containing a newline are refused; the state file is line based.
fn file_record(entry: &DirEntry) -> Result<FileRecord> {
    let path = entry.path();
    let path_str = path.display().to_string();
    let meta = entry.metadata().map_err(|e| {
        AuditError::io(
            &path_str,
            e.into_io_error()
                .unwrap_or_else(|| std::io::Error::other("symlink loop")),
        )
    })?;
    let canonical = std::fs::canonicalize(path).map_err(|e| AuditError::io(&path_str, e))?;
    if canonical.as_os_str().as_bytes().contains(&b'\n') {
        return Err(AuditError::io(
            path_str,
            std::io::Error::new(std::io::ErrorKind::InvalidData, "path contains a newline"),
        ));
    }

    trace!(
        dev = meta.dev(),
        ino = meta.ino(),
        mtime = meta.mtime(),
        path = %canonical.display(),
        "stat"
    );
    Ok(FileRecord::new(
        FileIdentity::from_metadata(&meta),
        canonical,
        meta.mtime(),
        RecordSource::Scan,
    ))
}
