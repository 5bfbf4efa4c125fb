//! System discovery -- scan-root inventory and live processes.

pub mod files;
pub mod processes;

pub use files::scan_roots;
pub use processes::{encode_dev, ProcessSource, ProcfsSource};
