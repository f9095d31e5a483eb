use std::path::PathBuf;

use crate::commands::{run_import, run_migrate};
use crate::server;
use childcare_registry::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Childcare Registry",
    about = "Run the childcare client registry service and its data tooling",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Import the legacy client export into the canonical collections
    Import(ImportArgs),
    /// Upgrade stored documents to the multi-parent reference schema
    Migrate(MigrateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Path to the exported legacy spreadsheet
    #[arg(default_value = "legacy.csv")]
    pub(crate) file: PathBuf,
    /// Aggregate and report without writing anything
    #[arg(long)]
    pub(crate) dry: bool,
}

#[derive(Args, Debug)]
pub(crate) struct MigrateArgs {
    /// Report what the migration would change without writing
    #[arg(long)]
    pub(crate) dry: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Import(args) => run_import(args),
        Command::Migrate(args) => run_migrate(args),
    }
}
