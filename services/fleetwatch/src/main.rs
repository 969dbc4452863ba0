//! Fleetwatch CLI
//!
//! Command-line interface for the fleet monitoring service.

use std::path::PathBuf;

use clap::Parser;
use fleetwatch::{load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "fleetwatch")]
#[command(about = "Fleet monitoring service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    tracing::info!(
        "Starting fleetwatch: stream {}:{}, {} watched server(s)",
        config.stream.host,
        config.stream.port,
        config.watch.servers.len()
    );

    fleetwatch::run(config).await?;

    Ok(())
}
