//! Core types for the audit system.

pub mod file;
pub mod process;
pub mod report;
pub mod severity;

pub use file::{FileIdentity, FileRecord, RecordSource};
pub use process::{
    MappingTally, MemoryRegion, ProcessSnapshot, ProcessVerdict, Protection, RegionKind,
};
pub use report::{RunReport, RunSummary, ScanStats};
pub use severity::Severity;
