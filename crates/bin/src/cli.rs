//! CLI argument definitions for the Coffer binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Record store type
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Backend {
    /// SQLite database (default)
    Sqlite,
    /// In-memory with JSON persistence
    Inmemory,
}

/// Coffer record store maintenance
///
/// Works on raw records only. The CLI never holds a session key, so it can
/// list, back up, and restore encrypted records but can not read them.
#[derive(Parser, Debug)]
#[command(name = "coffer")]
#[command(about = "Coffer: maintenance for encrypted-at-rest record stores")]
#[command(version)]
pub struct Cli {
    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List records in a namespace
    List(ListArgs),
    /// Show the envelope of one record
    Inspect(InspectArgs),
    /// Write a namespace snapshot to a file
    Backup(BackupArgs),
    /// Write every record of a snapshot file back to the store
    Restore(RestoreArgs),
    /// Delete expired records in a namespace
    PurgeExpired(PurgeExpiredArgs),
}

/// Shared record store options
#[derive(clap::Args, Debug, Clone)]
pub struct BackendConfig {
    /// Record store to open
    #[arg(short, long, default_value = "sqlite", env = "COFFER_BACKEND")]
    pub backend: Backend,

    /// Data directory for storage files.
    /// For SQLite: stores coffer.db
    /// For InMemory: stores coffer.json
    #[arg(short = 'D', long, env = "COFFER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub backend_config: BackendConfig,

    /// Namespace to list; omit for the whole store
    #[arg(short, long)]
    pub namespace: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub backend_config: BackendConfig,

    /// Logical key of the record
    pub key: String,

    #[arg(short, long)]
    pub namespace: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct BackupArgs {
    #[command(flatten)]
    pub backend_config: BackendConfig,

    /// Namespace to snapshot; omit for the whole store
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// File to write the snapshot to
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub backend_config: BackendConfig,

    /// Snapshot file written by `coffer backup`
    pub input: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct PurgeExpiredArgs {
    #[command(flatten)]
    pub backend_config: BackendConfig,

    #[arg(short, long)]
    pub namespace: Option<String>,
}
