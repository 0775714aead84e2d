//! cfgsync CLI - Configuration synchronization between storages
//!
//! This is the main entry point for the cfgsync command-line interface.

mod cli;
mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Preview(args) => commands::preview::run(args, config).await,
        Commands::Validate => commands::validate::run(config).await,
        Commands::Import(args) => commands::import::run(args, config).await,
        Commands::ImportSingle(args) => commands::import_single::run(args, config).await,
        Commands::Export(args) => commands::export::run(args, config).await,
        Commands::Show(args) => commands::show::run(args, config).await,
        Commands::Status => commands::status::run(config).await,
        Commands::Log(args) => commands::log::run(args, config).await,
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
