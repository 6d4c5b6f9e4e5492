//! Tapper command line entry point.

use clap::Parser;
use std::process::ExitCode;
use tapper::cli::Cli;
use tapper::error::CliError;
use tapper::output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.globals.verbose, cli.globals.quiet) {
        output::print_warning(&format!("logging disabled: {:#}", e));
    }

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Failures(failures)) => {
            output::print_failures(&failures);
            output::print_error(&format!("{} device(s) failed", failures.len()));
            ExitCode::FAILURE
        }
        Err(e) => {
            output::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout stays parseable. `RUST_LOG` overrides the flags.
fn init_tracing(verbose: bool, quiet: bool) -> anyhow::Result<()> {
    let default = if verbose {
        "tapper=debug,warn"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
