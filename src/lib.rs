//! obdwatch - live dashboard client for an OBD diagnostic telemetry feed
//!
//! This library provides the session layer of the dashboard: it keeps one
//! logical connection to the backend alive, classifies inbound frames,
//! buffers telemetry samples and gates outbound commands on the connection
//! state.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: synchronous core (state machine, router, buffer, heartbeat)
//! - `runtime`: tokio driver, timers and the WebSocket channel
//! - `api`: REST client for the backend's serial and data endpoints
//! - `commands`: CLI command handlers and monitor input parsing
//! - `config`: Configuration management and validation
//! - `logging`: tracing subscriber setup
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use obdwatch::runtime::SessionDriver;
//! use obdwatch::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let (mut driver, handle) =
//!         SessionDriver::websocket(config.session_settings(), config.ws_url()?)?;
//!     driver
//!         .observers_mut()
//!         .on_sample_added(|sample| println!("{}", sample.raw()));
//!
//!     let task = tokio::spawn(driver.run(true));
//!     handle.shutdown()?;
//!     task.await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use error::{ObdWatchError, Result};
pub use runtime::{SessionDriver, SessionHandle};
pub use session::{ConnectionManager, SessionSettings, SessionState, TelemetryBuffer, TelemetrySample};
