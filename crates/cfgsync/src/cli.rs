//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use cfgsync_import::ledger::DEFAULT_LOG_TAIL_LINES;
use clap::{Args, Parser, Subcommand};

/// cfgsync - Configuration synchronization between storages
#[derive(Parser, Debug)]
#[command(name = "cfgsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to cfgsync.yaml settings file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show what an import would change
    Preview(PreviewArgs),

    /// Validate the pending changes without importing
    Validate,

    /// Import the sync storage into the active storage
    Import(ImportArgs),

    /// Import a single configuration document
    ImportSingle(ImportSingleArgs),

    /// Replace the sync storage with the active storage
    Export(ExportArgs),

    /// Print one configuration document
    Show(ShowArgs),

    /// Show storage locations, pending changes and the last import
    Status,

    /// Show the import log
    Log(LogArgs),
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ImportSingleArgs {
    /// YAML file holding the document
    #[arg(short, long)]
    pub file: Utf8PathBuf,

    /// Config name of a simple configuration
    #[arg(long, conflicts_with = "entity_type", required_unless_present = "entity_type")]
    pub name: Option<String>,

    /// Config entity type id (see `entity-types` in cfgsync.yaml)
    #[arg(long = "type", value_name = "ENTITY_TYPE")]
    pub entity_type: Option<String>,

    /// Entity id replacing the one in the document
    #[arg(long, requires = "entity_type")]
    pub id: Option<String>,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Config name
    pub name: String,

    /// Read from the sync storage instead of the active storage
    #[arg(long)]
    pub sync: bool,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Number of events to show
    #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_TAIL_LINES)]
    pub limit: usize,

    /// Summarize runs instead of listing events
    #[arg(long)]
    pub runs: bool,

    /// Output as JSON lines
    #[arg(long)]
    pub json: bool,
}
