//! Expected-missing allow-list.
//!
//! Some programs unpack a library to a temp file, map it and delete it
//! straight away. A whitelist line `path\tcount` says the process running
//! `path` is expected to map exactly `count` deleted files; a process that
//! matches the count exactly is not reported as missing.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::{Read, Write as _};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{AuditError, Result};
use crate::persist::write_atomic;
use crate::types::ProcessVerdict;

/// Filename standing for standard input or output.
pub const STDIO: &str = "-";

/// One whitelist line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    /// Executable path of the process
    pub path: String,
    /// Number of missing mappings to tolerate
    pub expected_missing: u32,
}

impl WhitelistEntry {
    /// Whitelist line for a process with missing mappings, `None` if it has
    /// none.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::UnresolvedExecutable` if the process has missing
    /// mappings but its executable path is unknown.
    pub fn from_verdict(verdict: &ProcessVerdict) -> Result<Option<Self>> {
        if verdict.tally.missing == 0 {
            return Ok(None);
        }
        let path = verdict
            .exe_path
            .clone()
            .ok_or(AuditError::UnresolvedExecutable { pid: verdict.pid })?;
        Ok(Some(Self {
            path,
            expected_missing: verdict.tally.missing,
        }))
    }
}

/// Loaded whitelist, consulted read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
}

impl Whitelist {
    #[must_use]
    pub const fn from_entries(entries: Vec<WhitelistEntry>) -> Self {
        Self { entries }
    }

    /// Parse whitelist text. `source_name` labels errors.
    pub fn parse(source_name: &str, contents: &str) -> Result<Self> {
        let entries = contents
            .lines()
            .enumerate()
            .map(|(idx, line)| {
                parse_line(line).map_err(|reason| AuditError::WhitelistFormat {
                    source_name: source_name.to_string(),
                    line: idx + 1,
                    reason,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Load from a file, or from standard input for `-`.
    pub fn load(path: &Path) -> Result<Self> {
        let label = path.display().to_string();
        let contents = if path.as_os_str() == STDIO {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| AuditError::io("<stdin>", e))?;
            buf
        } else {
            std::fs::read_to_string(path).map_err(|e| AuditError::io(&label, e))?
        };
        let list = Self::parse(&label, &contents)?;
        info!(source = %label, entries = list.entries.len(), "whitelist loaded");
        Ok(list)
    }

    /// Expected missing count for `exe`. The first matching line wins.
    #[must_use]
    pub fn expected_missing(&self, exe: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.path == exe)
            .map(|e| e.expected_missing)
    }

    /// Suppress the missing mappings of `verdict` if they match its entry
    /// exactly. Replaced and errored mappings are left alone. Returns
    /// whether anything was suppressed.
    pub fn apply(&self, verdict: &mut ProcessVerdict) -> bool {
        if verdict.tally.missing == 0 {
            return false;
        }
        let Some(exe) = verdict.exe_path.as_deref() else {
            return false;
        };
        let Some(expected) = self.expected_missing(exe) else {
            return false;
        };
        if expected != verdict.tally.missing {
            debug!(
                pid = verdict.pid,
                exe,
                expected,
                actual = verdict.tally.missing,
                "whitelist count differs"
            );
            return false;
        }

        debug!(pid = verdict.pid, exe, suppressed = expected, "whitelisted");
        verdict.tally.suppressed = verdict.tally.missing;
        verdict.tally.missing = 0;
        verdict.refresh();
        true
    }

    /// Whitelist file contents.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            let _ = writeln!(out, "{}\t{}", e.path, e.expected_missing);
        }
        out
    }

    /// Write to a file atomically, or to standard output for `-`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = self.render();
        if path.as_os_str() == STDIO {
            let mut out = std::io::stdout().lock();
            return out
                .write_all(data.as_bytes())
                .and_then(|()| out.flush())
                .map_err(|e| AuditError::io("<stdout>", e));
        }
        info!(path = %path.display(), entries = self.entries.len(), "writing whitelist");
        write_atomic(path, data.as_bytes())
    }
}

fn parse_line(line: &str) -> std::result::Result<WhitelistEntry, String> {
    let (path, count) = line
        .split_once('\t')
        .ok_or_else(|| "expected 'path<TAB>count'".to_string())?;
    if path.is_empty() {
        return Err("empty path".into());
    }
    let expected_missing: u32 = count
        .parse()
        .map_err(|_| format!("bad count '{count}'"))?;
    if expected_missing == 0 {
        return Err("count must be positive".into());
    }
    Ok(WhitelistEntry {
        path: path.to_string(),
        expected_missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MappingTally, Severity};

    fn verdict(exe: Option<&str>, tally: MappingTally) -> ProcessVerdict {
        let mut v = ProcessVerdict {
            pid: 77,
            jid: 0,
            command: exe.unwrap_or("(tmp)").to_string(),
            exe_path: exe.map(str::to_string),
            tally,
            severity: Severity::Okay,
        };
        v.refresh();
        v
    }

    fn missing(n: u32) -> MappingTally {
        MappingTally {
            qualifying: n + 1,
            missing: n,
            ..MappingTally::default()
        }
    }

    #[test]
    fn exact_count_suppresses() {
        let list = Whitelist::parse("w", "/usr/bin/unpacker\t2\n").unwrap();
        let mut v = verdict(Some("/usr/bin/unpacker"), missing(2));
        assert_eq!(v.severity, Severity::Missing);

        assert!(list.apply(&mut v));
        assert_eq!(v.severity, Severity::Okay);
        assert_eq!(v.tally.suppressed, 2);
        assert_eq!(v.tally.missing, 0);
    }

    #[test]
    fn different_count_still_missing() {
        let list = Whitelist::parse("w", "/usr/bin/unpacker\t1\n").unwrap();
        let mut v = verdict(Some("/usr/bin/unpacker"), missing(2));
        assert!(!list.apply(&mut v));
        assert_eq!(v.severity, Severity::Missing);
    }

    #[test]
    fn mismatch_and_err_survive_suppression() {
        let list = Whitelist::parse("w", "/usr/bin/unpacker\t1\n").unwrap();

        let mut replaced = verdict(
            Some("/usr/bin/unpacker"),
            MappingTally {
                mismatched: 1,
                ..missing(1)
            },
        );
        assert!(list.apply(&mut replaced));
        assert_eq!(replaced.severity, Severity::Mismatch);

        let mut errored = verdict(
            Some("/usr/bin/unpacker"),
            MappingTally {
                errors: 1,
                ..missing(1)
            },
        );
        assert!(list.apply(&mut errored));
        assert_eq!(errored.severity, Severity::Err);
    }

    #[test]
    fn unlisted_or_unnamed_processes_untouched() {
        let list = Whitelist::parse("w", "/usr/bin/unpacker\t1\n").unwrap();
        let mut other = verdict(Some("/usr/bin/other"), missing(1));
        assert!(!list.apply(&mut other));
        let mut unnamed = verdict(None, missing(1));
        assert!(!list.apply(&mut unnamed));
        assert_eq!(unnamed.severity, Severity::Missing);
    }

    #[test]
    fn rejects_malformed_lines() {
        for bad in [
            "/a\t0\n",
            "/a\t-1\n",
            "/a 2\n",
            "/a\t\n",
            "\t3\n",
            "\n",
            "/a\t2x\n",
        ] {
            let err = Whitelist::parse("w", bad).unwrap_err();
            assert!(matches!(err, AuditError::WhitelistFormat { line: 1, .. }), "{bad:?}");
        }
    }

    #[test]
    fn path_may_contain_spaces_and_last_line_may_lack_newline() {
        let list = Whitelist::parse("w", "/opt/My App/run\t3\n/b\t1").unwrap();
        assert_eq!(list.expected_missing("/opt/My App/run"), Some(3));
        assert_eq!(list.expected_missing("/b"), Some(1));
    }

    #[test]
    fn first_duplicate_wins() {
        let list = Whitelist::parse("w", "/a\t1\n/a\t5\n").unwrap();
        assert_eq!(list.expected_missing("/a"), Some(1));
    }

    #[test]
    fn generation_needs_an_executable_path() {
        assert_eq!(
            WhitelistEntry::from_verdict(&verdict(Some("/x"), missing(3))).unwrap(),
            Some(WhitelistEntry {
                path: "/x".into(),
                expected_missing: 3
            })
        );
        assert_eq!(
            WhitelistEntry::from_verdict(&verdict(None, MappingTally::default())).unwrap(),
            None
        );
        let err = WhitelistEntry::from_verdict(&verdict(None, missing(1))).unwrap_err();
        assert!(matches!(err, AuditError::UnresolvedExecutable { pid: 77 }));
    }

    #[test]
    fn saved_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whitelist");
        let list = Whitelist::from_entries(vec![
            WhitelistEntry {
                path: "/a".into(),
                expected_missing: 1,
            },
            WhitelistEntry {
                path: "/b c".into(),
                expected_missing: 4,
            },
        ]);
        list.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "/a\t1\n/b c\t4\n");
        assert_eq!(Whitelist::load(&path).unwrap(), list);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Whitelist::load(&dir.path().join("absent")).unwrap_err();
        assert!(err.is_not_found());
    }
}
