//! recbolt CLI
//!
//! Command-line tools for looking into recbolt store files.
//!
//! # Commands
//!
//! - `inspect` - List buckets with their entry counts
//! - `dump` - Print the records of one bucket as JSON

mod commands;

use clap::{Parser, Subcommand};
use recbolt_core::Options;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// recbolt command-line store tools.
#[derive(Parser)]
#[command(name = "recbolt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long, default_value = "models.db")]
    path: PathBuf,

    /// How long to wait for the store lock, in milliseconds
    #[arg(global = true, long, default_value = "50")]
    timeout_ms: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List buckets and entry counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dump a bucket's records as JSON
    Dump {
        /// Bucket (collection) name
        bucket: String,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = Options::new()
        .file(cli.path)
        .open_timeout(std::time::Duration::from_millis(cli.timeout_ms));

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Inspect { format } => commands::inspect::run(&options, &format, &mut out)?,
        Commands::Dump { bucket, limit } => {
            commands::dump::run(&options, &bucket, limit, &mut out)?;
        }
    }

    Ok(())
}
