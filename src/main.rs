//! Casino service binary
//!
//! Opens the casino storage, settles anything an earlier run left unfinished
//! and drives the roulette wheel until interrupted.

use casino_roulette::{Casino, ConfigLoader, LogSink};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};

/// Roulette casino background service
#[derive(Parser)]
#[command(name = "casino")]
#[command(about = "Roulette betting ledger and spin scheduler")]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory for casino storage
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Game to drive; repeat for several tables
    #[arg(short, long = "game")]
    games: Vec<String>,

    /// Keep all state in memory
    #[arg(long)]
    memory: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    write_config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    if let Some(data_dir) = cli.data_dir {
        config.storage.data_directory = data_dir;
    }
    if !cli.games.is_empty() {
        config.scheduler.games = cli.games;
    }
    if cli.memory {
        config.storage.in_memory = true;
    }
    config.validate()?;

    if let Some(path) = cli.write_config {
        loader.save(&config, &path)?;
        println!("Configuration written to {}", path);
        return Ok(());
    }

    let default_filter = if cli.verbose {
        "debug"
    } else {
        config.monitoring.log_level.as_filter()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    tracing::info!(
        data_dir = %config.storage.data_directory,
        in_memory = config.storage.in_memory,
        games = ?config.scheduler.games,
        "Starting casino"
    );

    let casino = Arc::new(Casino::open(config)?);
    casino.recover_pending()?;

    let driver = Arc::new(casino.driver(Arc::new(LogSink)));
    let handle = tokio::spawn(driver.clone().start());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    driver.stop();
    handle.await?;

    let snapshot = casino.metrics();
    tracing::info!(
        bets_placed = snapshot.bets_placed,
        spins = snapshot.spins,
        house_result = snapshot.house_result(),
        "Casino stopped"
    );

    Ok(())
}
