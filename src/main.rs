//! obdwatch - live OBD telemetry dashboard client
//!
//! Main entry point for the obdwatch CLI.

use anyhow::Result;

use obdwatch::cli::{Cli, Commands};
use obdwatch::commands::{backend, monitor};
use obdwatch::config::Config;
use obdwatch::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/obdwatch.yaml");
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Monitor { .. } => {
            tracing::info!("Starting live monitor");
            monitor::run_monitor(config).await
        }
        Commands::Ports { json } => backend::list_ports(&config, json).await,
        Commands::Connect { port, baud } => {
            tracing::info!("Opening serial port {} at {} baud", port, baud);
            backend::connect_serial(&config, &port, baud).await
        }
        Commands::Disconnect => backend::disconnect_serial(&config).await,
        Commands::Clear => backend::clear(&config).await,
        Commands::Export => backend::export(&config).await,
        Commands::Chart => backend::chart(&config).await,
    }
}
