use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tours API CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "tours-api",
    version,
    about = "REST API for managing and querying tour packages"
)]
pub struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// MongoDB connection string (overrides DATABASE)
    #[arg(long)]
    pub database_uri: Option<String>,

    /// Runtime stage: development or production (overrides APP_ENV)
    #[arg(long)]
    pub env: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bulk-import tours from a JSON file, then exit
    Import {
        /// Path to a JSON array of tour objects
        #[arg(long, default_value = "dev-data/tours.json")]
        file: PathBuf,
    },
    /// Delete every tour from the collection, then exit
    Purge,
}
