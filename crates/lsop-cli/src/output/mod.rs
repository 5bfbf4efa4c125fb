//! Output formatting for different formats.

use clap::ValueEnum;
use colored::Colorize;
use lsop_audit::{RunReport, Severity};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Fixed-width `pid jid stat command` table
    #[default]
    Table,
    /// Full run report as JSON
    Json,
}

/// How the table is drawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableStyle {
    pub header: bool,
    /// Include processes with nothing to report
    pub all: bool,
    pub color: bool,
}

const HEADER: [&str; 4] = ["pid", "jid", "stat", "command"];

/// Render the process table. The header is written once before the first
/// row, so a clean run prints nothing.
#[must_use]
pub fn render_table(report: &RunReport, style: TableStyle) -> String {
    let mut out = String::new();
    let rows = report
        .verdicts
        .iter()
        .filter(|v| style.all || v.severity != Severity::Okay);

    for (i, verdict) in rows.enumerate() {
        if i == 0 && style.header {
            let [pid, jid, stat, command] = HEADER;
            let _ = writeln!(out, "{pid:>6} {jid:>6} {stat:>4} {command}");
        }
        let _ = writeln!(
            out,
            "{:>6} {:>6} {} {}",
            verdict.pid,
            verdict.jid,
            stat_cell(verdict.severity, style.color),
            verdict.command
        );
    }
    out
}

/// Render the report in `format`.
pub fn render(report: &RunReport, format: OutputFormat, style: TableStyle) -> anyhow::Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(report, style)),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(report)?;
            json.push('\n');
            Ok(json)
        }
    }
}

fn stat_cell(severity: Severity, color: bool) -> String {
    let cell = format!("{:>4}", severity.label());
    if !color {
        return cell;
    }
    match severity {
        Severity::Okay => cell.dimmed().to_string(),
        Severity::Err => cell.magenta().to_string(),
        Severity::Mismatch => cell.yellow().bold().to_string(),
        Severity::Missing => cell.red().bold().to_string(),
    }
}
