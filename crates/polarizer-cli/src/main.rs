mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    if let Err(e) = run_app() {
        match &e {
            CliError::Core(core) => eprintln!("\n❌ Error ({:?}): {}", core.kind(), e),
            _ => eprintln!("\n❌ Error: {}", e),
        }
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("   caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Polarizer CLI starting up"
    );
    debug!("Parsed CLI arguments: {:?}", cli);

    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Polarize(args) => commands::polarize::run(args, quiet),
        Commands::Check(args) => commands::check::run(args, quiet),
    };

    match &result {
        Ok(()) => info!("Command completed successfully."),
        Err(e) => error!("Command failed: {}", e),
    }
    result
}
