//! # lsop-audit
//!
//! Find running processes whose code no longer matches the filesystem.
//!
//! A process keeps executing the file it mapped even after that file is
//! upgraded or deleted on disk. After a package update such processes still
//! run the old, possibly vulnerable, code until restarted. This crate checks
//! every executable mapping of every process against what is on disk now.
//!
//! ## Verdicts
//!
//! - **Okay** (`-`) -- every mapping matches a file on disk
//! - **Err** (`err`) -- something could not be checked
//! - **Mismatch** (`outd`) -- a mapped file was replaced by newer content
//! - **Missing** (`miss`) -- a mapped file no longer exists
//!
//! ## Data Flow
//!
//! ```text
//! Phase 1: Inventory (stateful mode only)
//!   baseline::load() -> IdentityRegistry
//!   scan_roots() -> observe() each regular file, link replacements
//!
//! Phase 2: Reconciliation
//!   ProcessSource::processes() -> Reconciler::classify() each
//!   -> ProcessVerdict (worst severity of its mappings)
//!
//! Phase 3: Whitelist
//!   consult: Whitelist::apply() suppresses exact missing counts
//!   create:  WhitelistEntry::from_verdict() for each process
//!
//! Phase 4: Persist (stateful mode only)
//!   baseline::save() atomically -> RunReport
//! ```

pub mod baseline;
pub mod config;
pub mod discovery;
pub mod error;
pub mod hash;
pub mod persist;
pub mod reconcile;
pub mod registry;
pub mod types;
pub mod whitelist;

pub use config::{AuditConfig, ScanOptions, DEFAULT_SCAN_PATHS};
pub use discovery::{ProcessSource, ProcfsSource};
pub use error::{AuditError, Result};
pub use reconcile::{FileStat, Reconciler, SystemStat};
pub use registry::IdentityRegistry;
pub use types::*;
pub use whitelist::{Whitelist, WhitelistEntry};

use chrono::Utc;
use tracing::{debug, info, Level};

use crate::hash::TableHasher;

/// What the run does with the whitelist.
#[derive(Debug, Clone, Default)]
pub enum WhitelistMode {
    #[default]
    Off,
    /// Suppress processes whose missing count matches their entry
    Consult(Whitelist),
    /// Build whitelist entries from this run instead of suppressing
    Create,
}

/// Run one audit: inventory, reconcile every process, apply the whitelist
/// and persist the baseline.
///
/// # Errors
///
/// Returns `AuditError` on operational failures: invalid configuration,
/// unreadable or malformed baseline, no traversable scan root, unreadable process table, baseline
/// save failure, or a process that cannot be named in whitelist creation.
pub fn audit<P, S>(
    config: &AuditConfig,
    whitelist: &WhitelistMode,
    source: &P,
    stat: &S,
) -> Result<RunReport>
where
    P: ProcessSource + ?Sized,
    S: FileStat,
{
    config.validate()?;
    let mut registry = IdentityRegistry::with_buckets(TableHasher::seeded()?, config.buckets);

    // Phase 1: Inventory
    let scan = match &config.baseline {
        Some(path) => {
            baseline::load(path, &mut registry)?;
            let stats = discovery::scan_roots(&mut registry, &config.scan_roots, config.scan)?;
            if tracing::enabled!(Level::TRACE) {
                registry.dump();
            }
            Some(stats)
        }
        None => None,
    };

    // Phase 2 + 3: Reconcile and whitelist
    let mut verdicts = Vec::new();
    let mut generated = Vec::new();
    {
        let mut reconciler = Reconciler::new(&mut registry, stat);
        for process in source.processes()? {
            let mut verdict = reconciler.classify(&process);
            match whitelist {
                WhitelistMode::Off => {}
                WhitelistMode::Consult(list) => {
                    list.apply(&mut verdict);
                }
                WhitelistMode::Create => {
                    if let Some(entry) = WhitelistEntry::from_verdict(&verdict)? {
                        generated.push(entry);
                    }
                }
            }
            debug!(pid = verdict.pid, severity = %verdict.severity, command = %verdict.command, "classified");
            verdicts.push(verdict);
        }
    }

    // Phase 4: Persist
    if let Some(path) = &config.baseline {
        if config.update_baseline {
            baseline::save(path, &registry)?;
        } else {
            info!(path = %path.display(), "dry run, state file left unchanged");
        }
    }

    let severity = Severity::worst(verdicts.iter().map(|v| v.severity));
    let summary = RunSummary::from_verdicts(&verdicts, &registry);
    info!(
        processes = summary.processes,
        errors = summary.errors,
        outdated = summary.outdated,
        missing = summary.missing,
        severity = %severity,
        "audit complete"
    );

    Ok(RunReport {
        collected_at: Utc::now(),
        severity,
        verdicts,
        summary,
        scan,
        generated_whitelist: matches!(whitelist, WhitelistMode::Create).then_some(generated),
    })
}
