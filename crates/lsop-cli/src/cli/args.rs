//! Command-line argument definitions using clap.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// List processes running deleted or replaced executables and libraries
///
/// By default every process's executable mappings are checked against the
/// files on disk now. With -s, directories are inventoried and compared with
/// the previous run's state file, which also catches files replaced in place.
///
/// stat column: "-" ok, "err" could not check, "outd" replaced, "miss" deleted
#[derive(Parser, Debug)]
#[command(name = "lsop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Do not print the table header
    #[arg(short = 'H', long)]
    pub no_header: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Write a whitelist of expected missing mappings to FILE ("-" for stdout)
    #[arg(short = 'c', long, value_name = "FILE", conflicts_with = "whitelist")]
    pub create_whitelist: Option<PathBuf>,

    /// Suppress processes listed in the whitelist FILE ("-" for stdin)
    #[arg(short = 'w', long, value_name = "FILE")]
    pub whitelist: Option<PathBuf>,

    /// State file for the stateful scan; created if missing
    #[arg(short = 's', long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Scan directories recursively (stateful scan only)
    #[arg(short, long)]
    pub recursive: bool,

    /// Follow symlinks while scanning (stateful scan only)
    #[arg(short, long)]
    pub follow_symlinks: bool,

    /// Do not update the state file (stateful scan only)
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// List every process, not only those with findings
    #[arg(short, long)]
    pub all: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Config file (default: <config dir>/lsop/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directories to scan (stateful scan only; default: system bin and lib dirs)
    #[arg(value_name = "DIR")]
    pub dirs: Vec<PathBuf>,
}

impl Cli {
    /// Flags that only make sense together with a state file.
    pub fn stateful_only_flags(&self) -> Vec<&'static str> {
        let mut used = Vec::new();
        if self.recursive {
            used.push("-r");
        }
        if self.follow_symlinks {
            used.push("-f");
        }
        if self.dry_run {
            used.push("-n");
        }
        if !self.dirs.is_empty() {
            used.push("DIR");
        }
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("lsop").chain(args.iter().copied()))
    }

    #[test]
    fn short_flags_match_getopt_string() {
        let cli = parse(&["-H", "-vv", "-s", "/tmp/state", "-r", "-f", "/usr/lib"]).unwrap();
        assert!(cli.no_header);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.state, Some(PathBuf::from("/tmp/state")));
        assert!(cli.recursive && cli.follow_symlinks);
        assert_eq!(cli.dirs, vec![PathBuf::from("/usr/lib")]);
        assert_eq!(cli.stateful_only_flags(), vec!["-r", "-f", "DIR"]);
    }

    #[test]
    fn create_and_consult_are_exclusive() {
        let err = parse(&["-c", "a", "-w", "b"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn whitelist_combines_with_state() {
        let cli = parse(&["-w", "-", "-s", "/tmp/state"]).unwrap();
        assert_eq!(cli.whitelist, Some(PathBuf::from("-")));
        assert!(cli.stateful_only_flags().is_empty());
    }

    #[test]
    fn output_format_values() {
        assert_eq!(parse(&["-o", "json"]).unwrap().output, Some(OutputFormat::Json));
        assert!(parse(&["-o", "yaml"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
