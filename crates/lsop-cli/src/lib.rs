//! # lsop-cli
//!
//! Command-line front end for `lsop-audit`.
//!
//! ## Modes
//!
//! - **Plain scan** (default): check every process's executable mappings
//!   against the files currently on disk
//! - **Stateful scan** (`-s FILE`): inventory scan roots, compare with the
//!   previous run's state file and save the new state
//! - **Whitelist** (`-w FILE` / `-c FILE`): suppress or record expected
//!   missing mappings per executable
//!
//! ## Exit Codes
//!
//! - `0` -- nothing found
//! - `1` -- operational failure, or some mapping could not be checked
//! - `2` -- a process runs replaced or deleted code
//! - `64` -- usage error

pub mod cli;
pub mod config;
pub mod output;

pub use cli::run;
