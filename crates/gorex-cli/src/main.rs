mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gorex: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Routes panics from worker threads into the log before the default report, so a crashed
/// replica leaves a trace in `--log-file` as well as on stderr.
fn log_panics() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        error!(thread = thread.name().unwrap_or("unnamed"), "Panic: {info}");
        default_hook(info);
    }));
}

fn execute(cli: Cli) -> Result<()> {
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;
    log_panics();

    info!(version = env!("CARGO_PKG_VERSION"), "gorex replica-exchange sampler");
    debug!(?cli, "Parsed command line");

    let outcome = match cli.command {
        Commands::Run(args) => commands::run::run(args, cli.threads),
    };
    match &outcome {
        Ok(()) => info!("Run finished; outputs are complete."),
        Err(e) => error!("Run aborted: {e}"),
    }
    outcome
}
