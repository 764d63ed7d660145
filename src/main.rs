// ABOUTME: CLI entry point for table-replicator
// ABOUTME: Parses commands and routes them to the copy pipeline

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use table_replicator::commands;
use table_replicator::config::Settings;

#[derive(Parser)]
#[command(name = "table-replicator")]
#[command(
    about = "Watermark-driven incremental table replication between PostgreSQL databases",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    /// Path to the optional TOML file with connection credentials
    #[arg(long, global = true, default_value = "replicator.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one incremental copy pass over the tracked table pairs
    Run,
    /// Show the stored watermark for each tracked relation
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // 1. RUST_LOG environment variable has highest precedence
    // 2. --log flag is used if RUST_LOG is not set
    // 3. Default to "info" if neither are provided
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings = Settings::load(&cli.config)?;

    match cli.command {
        Commands::Run => commands::run(&settings).await,
        Commands::Status => commands::status(&settings).await,
    }
}
