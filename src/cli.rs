//! Command-line interface definition for obdwatch
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the live monitor and the backend serial/data commands.

use clap::{Parser, Subcommand};

/// Default baud rate for ELM327-style adapters
pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// obdwatch - live OBD telemetry dashboard client
///
/// Streams diagnostic readings from the backend, forwards serial commands
/// and chat questions, and drives the backend's serial link.
#[derive(Parser, Debug, Clone)]
#[command(name = "obdwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/obdwatch.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Stream live telemetry and chat with the backend
    Monitor {
        /// Override the backend WebSocket URL
        #[arg(short, long)]
        url: Option<String>,

        /// Override the number of samples kept in the buffer
        #[arg(long)]
        capacity: Option<usize>,

        /// Start disconnected; use /connect to open the session
        #[arg(long)]
        no_connect: bool,

        /// Ring the terminal bell for every sample
        #[arg(long)]
        sound: bool,
    },

    /// List serial ports visible to the backend
    Ports {
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Open the backend's serial connection to the vehicle adapter
    Connect {
        /// Serial device, e.g. /dev/ttyUSB0 or COM3
        #[arg(short, long)]
        port: String,

        /// Baud rate
        #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
        baud: u32,
    },

    /// Close the backend's serial connection
    Disconnect,

    /// Clear the backend's collected data
    Clear,

    /// Show a summary of the backend's data export
    Export,

    /// Show the backend's chart payload
    Chart,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_monitor() {
        let cli = Cli::try_parse_from([
            "obdwatch",
            "monitor",
            "--url",
            "ws://car.local:8000/ws",
            "--capacity",
            "250",
        ])
        .unwrap();

        match cli.command {
            Commands::Monitor {
                url,
                capacity,
                no_connect,
                sound,
            } => {
                assert_eq!(url.as_deref(), Some("ws://car.local:8000/ws"));
                assert_eq!(capacity, Some(250));
                assert!(!no_connect);
                assert!(!sound);
            }
            _ => panic!("Expected Monitor command"),
        }
    }

    #[test]
    fn test_cli_parse_connect_default_baud() {
        let cli = Cli::try_parse_from(["obdwatch", "connect", "--port", "/dev/ttyUSB0"]).unwrap();
        match cli.command {
            Commands::Connect { port, baud } => {
                assert_eq!(port, "/dev/ttyUSB0");
                assert_eq!(baud, DEFAULT_BAUD_RATE);
            }
            _ => panic!("Expected Connect command"),
        }
    }

    #[test]
    fn test_cli_parse_connect_requires_port() {
        assert!(Cli::try_parse_from(["obdwatch", "connect"]).is_err());
    }

    #[test]
    fn test_cli_parse_with_config_and_verbose() {
        let cli =
            Cli::try_parse_from(["obdwatch", "--config", "my.yaml", "--verbose", "ports"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("my.yaml"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Ports { json: false }));
    }

    #[test]
    fn test_cli_default_config_path() {
        let cli = Cli::try_parse_from(["obdwatch", "clear"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("config/obdwatch.yaml"));
        assert!(matches!(cli.command, Commands::Clear));
    }
}
