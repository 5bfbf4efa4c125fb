//! State file: the registry persisted between runs.
//!
//! One line per tracked file, `fsid:inode:mtime:path\n`, decimal fields.
//! Paths are written as raw bytes. A path containing `\n` cannot be
//! represented and is never written. A state file either loads completely
//! or not at all.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{AuditError, Result};
use crate::persist::write_atomic;
use crate::registry::IdentityRegistry;
use crate::types::{FileIdentity, FileRecord, RecordSource};

fn numeric_field<'a, T: std::str::FromStr>(
    fields: &mut impl Iterator<Item = &'a [u8]>,
    name: &str,
) -> std::result::Result<T, String> {
    let field = match fields.next() {
        None => return Err(format!("missing {name} field")),
        Some([]) => return Err(format!("empty {name} field")),
        Some(field) => field,
    };
    std::str::from_utf8(field)
        .ok()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| format!("bad {name} '{}'", String::from_utf8_lossy(field)))
}

/// Parse one state file line (without its trailing newline).
fn parse_line(line: &[u8]) -> std::result::Result<FileRecord, String> {
    let mut fields = line.splitn(4, |&b| b == b':');
    let fsid = numeric_field(&mut fields, "fsid")?;
    let inode = numeric_field(&mut fields, "inode")?;
    let mtime = numeric_field(&mut fields, "mtime")?;

    let path = fields.next().ok_or("missing path field")?;
    if !path.starts_with(b"/") {
        return Err(format!(
            "path '{}' is not absolute",
            String::from_utf8_lossy(path)
        ));
    }

    Ok(FileRecord::new(
        FileIdentity::new(fsid, inode),
        Path::new(OsStr::from_bytes(path)),
        mtime,
        RecordSource::Baseline,
    ))
}

/// Parse state file contents into records.
pub fn parse(path_label: &str, contents: &[u8]) -> Result<Vec<FileRecord>> {
    if contents.is_empty() {
        return Ok(Vec::new());
    }
    let body = contents.strip_suffix(b"\n").unwrap_or(contents);
    body.split(|&b| b == b'\n')
        .enumerate()
        .map(|(idx, line)| {
            parse_line(line).map_err(|reason| AuditError::BaselineFormat {
                path: path_label.to_string(),
                line: idx + 1,
                reason,
            })
        })
        .collect()
}

/// Load a state file into `registry`.
///
/// A missing file is a first run and loads nothing. Returns the number of
/// records loaded; on a format error nothing is inserted.
pub fn load(path: &Path, registry: &mut IdentityRegistry) -> Result<usize> {
    let path_str = path.display().to_string();
    let contents = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path_str, "no state file yet, starting empty");
            return Ok(0);
        }
        Err(e) => return Err(AuditError::io(path_str, e)),
    };

    info!(path = %path_str, "loading past state");
    let records = parse(&path_str, &contents)?;
    let count = records.len();
    for record in records {
        registry.insert_from_baseline(record);
    }
    info!(path = %path_str, count, "objects loaded from state file");
    Ok(count)
}

/// Render every record in the registry in state file format. Records whose
/// path contains a newline are left out.
#[must_use]
pub fn render(registry: &IdentityRegistry) -> Vec<u8> {
    let mut out = Vec::new();
    for r in registry.records() {
        let path = r.path.as_os_str().as_bytes();
        if path.contains(&b'\n') {
            warn!(path = %r.path.display(), "path contains a newline, not saved");
            continue;
        }
        out.extend_from_slice(
            format!("{}:{}:{}:", r.identity.device_id, r.identity.inode, r.mtime).as_bytes(),
        );
        out.extend_from_slice(path);
        out.push(b'\n');
    }
    out
}

/// Atomically replace the state file with the registry contents.
pub fn save(path: &Path, registry: &IdentityRegistry) -> Result<()> {
    info!(path = %path.display(), records = registry.len(), "saving state");
    write_atomic(path, &render(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::TableHasher;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn registry() -> IdentityRegistry {
        IdentityRegistry::new(TableHasher::seeded().unwrap())
    }

    fn triples(reg: &IdentityRegistry) -> HashSet<(u64, u64, i64, PathBuf)> {
        reg.records()
            .iter()
            .map(|r| (r.identity.device_id, r.identity.inode, r.mtime, r.path.clone()))
            .collect()
    }

    #[test]
    fn parses_well_formed_lines() {
        let recs = parse("s", b"5:100:1000:/opt/app/lib.so\n88:1:0:/a:b\n").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].identity, FileIdentity::new(5, 100));
        assert_eq!(recs[0].mtime, 1000);
        assert_eq!(recs[0].path, Path::new("/opt/app/lib.so"));
        assert_eq!(recs[0].source, RecordSource::Baseline);
        assert_eq!(recs[0].times_found, 0);
        // Only the first three colons delimit fields.
        assert_eq!(recs[1].path, Path::new("/a:b"));
    }

    #[test]
    fn rejects_malformed_lines() {
        for bad in [
            "5:100:1000\n",
            "x:100:1000:/a\n",
            "5::1000:/a\n",
            "5:100:1000:relative\n",
            "\n",
        ] {
            let err = parse("s", bad.as_bytes()).unwrap_err();
            assert!(matches!(err, AuditError::BaselineFormat { line: 1, .. }), "{bad:?}");
        }
    }

    #[test]
    fn error_reports_line_number() {
        let err = parse("s", b"1:2:3:/ok\n1:2:/bad\n").unwrap_err();
        assert!(matches!(err, AuditError::BaselineFormat { line: 2, .. }));
    }

    #[test]
    fn missing_file_is_empty_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry();
        let n = load(&dir.path().join("absent"), &mut reg).unwrap();
        assert_eq!(n, 0);
        assert!(reg.is_empty());
    }

    #[test]
    fn malformed_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        std::fs::write(&path, "1:2:3:/good\ngarbage\n").unwrap();
        let mut reg = registry();
        assert!(load(&path, &mut reg).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");

        let mut reg = registry();
        reg.observe(FileRecord::new(FileIdentity::new(5, 100), "/opt/app/lib.so", 1000, RecordSource::Scan));
        reg.observe(FileRecord::new(FileIdentity::new(5, 101), "/opt/app/lib.so", 2000, RecordSource::Scan));
        reg.observe(FileRecord::new(FileIdentity::new(7, 3), "/usr/bin/true", 55, RecordSource::Scan));
        save(&path, &reg).unwrap();

        let mut loaded = registry();
        assert_eq!(load(&path, &mut loaded).unwrap(), 3);
        assert_eq!(triples(&loaded), triples(&reg));
        assert!(loaded.is_consistent());
        assert!(loaded.records().iter().all(|r| r.source == RecordSource::Baseline));
    }

    #[test]
    fn non_utf8_paths_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        let raw = Path::new(OsStr::from_bytes(b"/usr/lib/lib\xff.so"));

        let mut reg = registry();
        reg.observe(FileRecord::new(FileIdentity::new(8, 1), raw, 10, RecordSource::Scan));
        save(&path, &reg).unwrap();

        let mut loaded = registry();
        assert_eq!(load(&path, &mut loaded).unwrap(), 1);
        assert_eq!(loaded.find_by_path(raw).unwrap().identity, FileIdentity::new(8, 1));
    }

    #[test]
    fn newline_paths_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");

        let mut reg = registry();
        reg.observe(FileRecord::new(FileIdentity::new(1, 1), "/tmp/evil\nname", 1, RecordSource::Scan));
        reg.observe(FileRecord::new(FileIdentity::new(1, 2), "/usr/bin/true", 2, RecordSource::Scan));
        save(&path, &reg).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1:2:2:/usr/bin/true\n");

        let mut loaded = registry();
        assert_eq!(load(&path, &mut loaded).unwrap(), 1);
    }

    #[test]
    fn empty_file_loads_nothing() {
        assert!(parse("s", b"").unwrap().is_empty());
    }

    #[test]
    fn save_over_existing_state_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        std::fs::write(&path, "1:1:1:/old\n").unwrap();

        let mut reg = registry();
        reg.observe(FileRecord::new(FileIdentity::new(2, 2), "/new", 2, RecordSource::Scan));
        save(&path, &reg).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2:2:2:/new\n");
    }
}
