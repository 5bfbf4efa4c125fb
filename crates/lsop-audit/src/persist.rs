//! All-or-nothing file replacement.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{AuditError, Result};

/// Replace `target` with `data`.
///
/// Writes a temporary sibling, syncs it, then renames it over `target`. On
/// any failure the temporary file is removed and `target` is untouched.
pub fn write_atomic(target: &Path, data: &[u8]) -> Result<()> {
    let target_str = target.display().to_string();
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| AuditError::io(parent.display().to_string(), e))?;
    debug!(temp = %temp.path().display(), target = %target_str, "writing");

    temp.write_all(data)
        .and_then(|()| temp.flush())
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| AuditError::io(&target_str, e))?;

    temp.persist(target)
        .map_err(|e| AuditError::io(&target_str, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("state");
        std::fs::write(&target, "old\n").unwrap();

        write_atomic(&target, b"new\n").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new\n");

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn failed_rename_leaves_target_and_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the target path cannot be replaced by a file.
        let target = dir.path().join("state");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        assert!(write_atomic(&target, b"data").is_err());
        assert!(target.join("keep").exists());
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn missing_parent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("no/such/dir/state");
        assert!(write_atomic(&target, b"data").is_err());
    }
}
