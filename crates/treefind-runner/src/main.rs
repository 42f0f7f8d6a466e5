//! `treefind` binary.

use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use treefind_runner::cli::{execute, Cli};
use treefind_runner::logging::init_tracing;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_level.as_deref()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    treefind_fetch::metrics::describe_metrics();

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
