//! CLI argument parsing, settings resolution and exit codes.

pub mod args;

use anyhow::Result;
use args::Cli;
use clap::error::ErrorKind;
use clap::Parser;
use lsop_audit::whitelist::STDIO;
use lsop_audit::{
    audit, AuditConfig, ProcfsSource, RunReport, ScanOptions, Severity, SystemStat, Whitelist,
    WhitelistMode, DEFAULT_SCAN_PATHS,
};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::output::{self, OutputFormat, TableStyle};

/// Nothing found.
pub const EXIT_OK: u8 = 0;
/// Operational failure, or some mapping could not be checked.
pub const EXIT_FAILURE: u8 = 1;
/// A process runs replaced or deleted code.
pub const EXIT_DRIFT: u8 = 2;
/// Bad command line (`EX_USAGE`).
pub const EXIT_USAGE: u8 = 64;

/// Invalid flag combination that clap cannot express.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(String);

/// Settings for one run, after merging flags, config file and defaults.
#[derive(Debug)]
pub struct Context {
    pub audit: AuditConfig,
    pub whitelist_in: Option<PathBuf>,
    pub whitelist_out: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub style: TableStyle,
}

impl Context {
    /// Merge `cli` over `config` over built-in defaults.
    pub fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let baseline = match &cli.state {
            Some(path) => Some(path.clone()),
            None => config.baseline_path()?,
        };

        let stateful_only = cli.stateful_only_flags();
        if baseline.is_none() && !stateful_only.is_empty() {
            return Err(UsageError(format!(
                "{} require a state file (-s)",
                stateful_only.join(", ")
            ))
            .into());
        }

        let scan_roots = if !cli.dirs.is_empty() {
            cli.dirs.clone()
        } else if !config.scan_roots.is_empty() {
            config.scan_root_paths()?
        } else {
            DEFAULT_SCAN_PATHS.iter().map(PathBuf::from).collect()
        };

        let output_format = cli.output.or(config.output_format).unwrap_or_default();
        let whitelist_to_stdout = cli
            .create_whitelist
            .as_ref()
            .is_some_and(|p| p.as_os_str() == STDIO);
        if whitelist_to_stdout && output_format == OutputFormat::Json {
            return Err(UsageError(
                "-c - cannot be combined with JSON output; the whitelist is in 'generated_whitelist'"
                    .into(),
            )
            .into());
        }

        let audit = AuditConfig {
            baseline,
            update_baseline: !cli.dry_run,
            scan_roots,
            scan: ScanOptions {
                recursive: cli.recursive || config.recursive,
                follow_symlinks: cli.follow_symlinks || config.follow_symlinks,
            },
            ..AuditConfig::default()
        };

        Ok(Self {
            audit,
            whitelist_in: cli.whitelist.clone(),
            whitelist_out: cli.create_whitelist.clone(),
            output_format,
            style: TableStyle {
                header: !(cli.no_header || config.no_header),
                all: cli.all,
                color: !cli.no_color && std::io::stdout().is_terminal(),
            },
        })
    }

    /// Whitelist handling for this run; loads the consulted file.
    pub fn whitelist_mode(&self) -> Result<WhitelistMode> {
        if self.whitelist_out.is_some() {
            return Ok(WhitelistMode::Create);
        }
        match &self.whitelist_in {
            Some(path) => Ok(WhitelistMode::Consult(Whitelist::load(path)?)),
            None => Ok(WhitelistMode::Off),
        }
    }
}

/// Run the CLI application.
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::from(EXIT_OK),
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(severity) => ExitCode::from(exit_code(severity)),
        Err(e) => {
            eprintln!("lsop: {e:#}");
            if e.is::<UsageError>() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }
}

/// Exit code for a run verdict.
#[must_use]
pub const fn exit_code(severity: Severity) -> u8 {
    if severity.is_drift() {
        EXIT_DRIFT
    } else if matches!(severity, Severity::Okay) {
        EXIT_OK
    } else {
        EXIT_FAILURE
    }
}

/// Map `-v` repetitions to a log level. `RUST_LOG` overrides it.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(cli: &Cli) -> Result<Severity> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = Context::resolve(cli, &config)?;
    let mode = ctx.whitelist_mode()?;

    let report = audit(&ctx.audit, &mode, &ProcfsSource::new(), &SystemStat)?;

    print_report(&ctx, &report)?;
    if let (Some(path), Some(entries)) = (&ctx.whitelist_out, &report.generated_whitelist) {
        Whitelist::from_entries(entries.clone()).save(path)?;
    }
    Ok(report.severity)
}

fn print_report(ctx: &Context, report: &RunReport) -> Result<()> {
    let rendered = output::render(report, ctx.output_format, ctx.style)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
