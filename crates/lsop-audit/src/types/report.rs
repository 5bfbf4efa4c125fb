//! Run report -- point-in-time result of one audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::process::ProcessVerdict;
use super::severity::Severity;
use crate::registry::IdentityRegistry;
use crate::whitelist::WhitelistEntry;

/// Counters from one directory inventory scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Roots that could be traversed
    pub roots_scanned: usize,
    /// Regular files examined
    pub examined: usize,
    /// Files newly tracked (including replacements)
    pub tracked: usize,
    /// Files already known with the same identity and mtime
    pub known: usize,
    /// Paths now holding different content than before
    pub replaced: usize,
    /// Entries that were neither regular files nor traversed directories
    pub skipped: usize,
    /// Entries that could not be examined
    pub errors: usize,
}

/// Complete result of an audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run finished
    pub collected_at: DateTime<Utc>,
    /// Worst severity across all processes
    pub severity: Severity,
    /// One verdict per process, in enumeration order
    pub verdicts: Vec<ProcessVerdict>,
    /// Summary statistics
    pub summary: RunSummary,
    /// Directory scan counters (stateful mode only)
    pub scan: Option<ScanStats>,
    /// Whitelist lines built from this run (whitelist creation only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_whitelist: Option<Vec<WhitelistEntry>>,
}

/// Summary statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub processes: usize,
    pub okay: usize,
    pub errors: usize,
    pub outdated: usize,
    pub missing: usize,
    /// Processes whose missing mappings were whitelisted
    pub suppressed: usize,
    /// Files in the identity registry
    pub tracked_files: usize,
    /// Tracked files mapped by at least one process
    pub referenced_files: usize,
    /// Tracked files superseded by newer content at the same path
    pub replaced_files: usize,
    /// Tracked files known only from the baseline, not found this run
    pub unseen_files: usize,
}

impl RunSummary {
    /// Build summary from verdicts and the registry they were checked against.
    #[must_use]
    pub fn from_verdicts(verdicts: &[ProcessVerdict], registry: &IdentityRegistry) -> Self {
        let count = |s: Severity| verdicts.iter().filter(|v| v.severity == s).count();
        let records = registry.records();
        Self {
            processes: verdicts.len(),
            okay: count(Severity::Okay),
            errors: count(Severity::Err),
            outdated: count(Severity::Mismatch),
            missing: count(Severity::Missing),
            suppressed: verdicts.iter().filter(|v| v.tally.suppressed > 0).count(),
            tracked_files: records.len(),
            referenced_files: records.iter().filter(|r| r.times_referenced > 0).count(),
            replaced_files: records.iter().filter(|r| r.replacement.is_some()).count(),
            unseen_files: records.iter().filter(|r| r.times_found == 0).count(),
        }
    }
}
