//! lsop - list processes running deleted or replaced code.

use std::process::ExitCode;

fn main() -> ExitCode {
    lsop_cli::run()
}
