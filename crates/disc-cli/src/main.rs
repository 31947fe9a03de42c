mod cli;
mod commands;
mod error;
mod logging;
mod progress;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet);

    if let Err(e) = run_app(cli) {
        error!("Command failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_app(cli: Cli) -> Result<()> {
    info!("discsim v{} starting up", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    match cli.command {
        Commands::Nvt(args) => commands::nvt::run(args),
        Commands::Rx(args) => commands::rx::run(args),
        Commands::Make(args) => commands::make::run(args),
        Commands::Wrap(args) => commands::wrap::run(args),
    }
}
