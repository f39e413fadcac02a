use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backend;
mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use output::OutputFormat;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("coffer=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match &cli.command {
        Commands::List(args) => commands::list::run(args, format).await,
        Commands::Inspect(args) => commands::inspect::run(args, format).await,
        Commands::Backup(args) => commands::backup::run(args, format).await,
        Commands::Restore(args) => commands::restore::run(args, format).await,
        Commands::PurgeExpired(args) => commands::purge_expired::run(args, format).await,
    }
}
