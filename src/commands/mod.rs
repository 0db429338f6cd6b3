/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint:

- `monitor`: live session with interactive input
- `backend`: one-shot REST commands (ports, serial connect/disconnect,
  clear, export, chart)

Input parsing for the monitor lives in [`input`].
*/

use std::ops::ControlFlow;

use colored::Colorize;

use crate::api::{BackendClient, ChartPayload};
use crate::commands::input::{help_text, UserInput};
use crate::error::Result;
use crate::runtime::SessionHandle;
use crate::session::buffer::{TelemetrySample, TelemetryStats};
use crate::session::events::{ChatRole, ConnectionChange, DisconnectReason, LogEntry, Severity};
use crate::session::protocol::OutboundCommand;

pub mod input;

/// Render one sample for the terminal
pub fn format_sample(sample: &TelemetrySample) -> String {
    let time = sample.timestamp().format("%H:%M:%S%.3f").to_string();
    match sample.numeric_value() {
        Some(value) => format!("{} {} {}", time.dimmed(), sample.raw(), format!("[{}]", value).cyan()),
        None => format!("{} {}", time.dimmed(), sample.raw()),
    }
}

/// Render one chat or system log line for the terminal
pub fn format_log_entry(entry: &LogEntry) -> String {
    match entry {
        LogEntry::Chat {
            role: ChatRole::Assistant,
            text,
        } => format!("{} {}", "assistant>".green().bold(), text),
        LogEntry::Chat {
            role: ChatRole::User,
            text,
        } => format!("{} {}", "you>".blue().bold(), text),
        LogEntry::System {
            severity: Severity::Error,
            text,
        } => format!("{} {}", "error:".red().bold(), text),
        LogEntry::System {
            severity: Severity::Info,
            text,
        } => format!("{} {}", "serial:".yellow(), text),
        LogEntry::System {
            severity: Severity::Debug,
            text,
        } => format!("{} {}", "debug:".dimmed(), text.dimmed()),
    }
}

/// Render a connection status change for the terminal
pub fn format_connection_change(change: &ConnectionChange) -> String {
    match change {
        ConnectionChange::Connected => format!("{}", "● connected".green()),
        ConnectionChange::Disconnected(DisconnectReason::Manual) => {
            format!("{}", "○ disconnected".yellow())
        }
        ConnectionChange::Disconnected(DisconnectReason::ChannelClosed(cause)) => {
            format!("{} ({}), reconnecting", "○ disconnected".red(), cause)
        }
    }
}

/// Render buffer statistics
pub fn format_stats(stats: &TelemetryStats) -> String {
    let fmt = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
    format!(
        "samples: {} (numeric: {})  latest: {}  min: {}  max: {}  mean: {}",
        stats.count,
        stats.numeric_count,
        fmt(stats.latest),
        fmt(stats.min),
        fmt(stats.max),
        fmt(stats.mean),
    )
}

/// Clear the backend's data store, then the local buffer if the backend
/// reported success.
///
/// Returns whether the clear happened.
pub async fn clear_data(api: &BackendClient, session: &SessionHandle) -> Result<bool> {
    let cleared = api.clear_data().await?;
    if cleared {
        session.clear_buffer()?;
    } else {
        tracing::warn!("Backend refused to clear data, keeping local buffer");
    }
    Ok(cleared)
}

/// Act on one line of parsed monitor input.
///
/// Failures that the user can recover from (not connected, backend errors)
/// are printed and the monitor keeps running. Returns `Break` on quit.
pub async fn handle_input(
    input: UserInput,
    session: &SessionHandle,
    api: &BackendClient,
) -> Result<ControlFlow<()>> {
    let outcome = match input {
        UserInput::Empty => Ok(()),
        UserInput::Serial(text) => session.send(OutboundCommand::serial(text)).await,
        UserInput::Chat(text) => {
            let result = session.send(OutboundCommand::chat(text.clone())).await;
            if result.is_ok() {
                println!("{}", format_log_entry(&LogEntry::user(text)));
            }
            result
        }
        UserInput::Ping => session.send(OutboundCommand::Ping).await,
        UserInput::Clear => clear_data(api, session).await.map(|cleared| {
            if cleared {
                println!("{}", "Data cleared".green());
            } else {
                println!("{}", "Backend did not clear data".yellow());
            }
        }),
        UserInput::Capacity(capacity) => session.set_capacity(capacity).await,
        UserInput::Connect => session.connect(),
        UserInput::Disconnect => session.disconnect(),
        UserInput::Ports => api.list_ports().await.map(|ports| print_ports(&ports)),
        UserInput::Stats => session
            .stats()
            .await
            .map(|stats| println!("{}", format_stats(&stats))),
        UserInput::Help => {
            println!("{}", help_text());
            Ok(())
        }
        UserInput::Quit => return Ok(ControlFlow::Break(())),
    };

    if let Err(e) = outcome {
        println!("{} {}", "error:".red().bold(), e);
    }
    Ok(ControlFlow::Continue(()))
}

fn print_ports(ports: &[crate::api::PortInfo]) {
    if ports.is_empty() {
        println!("No serial ports found");
        return;
    }
    for port in ports {
        println!("{:<24} {}", port.device.bold(), port.description);
    }
}

/// Live monitor command
pub mod monitor {
    //! Runs the session driver, renders its callbacks to the terminal and
    //! feeds typed lines back to it.

    use std::io::Write;
    use std::ops::ControlFlow;
    use std::time::Duration;

    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use tokio::sync::mpsc;

    use super::*;
    use crate::commands::input::parse_input;
    use crate::config::Config;
    use crate::runtime::SessionDriver;

    /// Start the live monitor
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub async fn run_monitor(config: Config) -> Result<()> {
        let api = BackendClient::new(
            config.api_base()?,
            Duration::from_secs(config.server.request_timeout_secs),
        )?;
        let (mut driver, session) =
            SessionDriver::websocket(config.session_settings(), config.ws_url()?)?;

        let observers = driver.observers_mut();
        observers.on_sample_added(|sample| println!("{}", format_sample(sample)));
        observers.on_log_entry(|entry| println!("{}", format_log_entry(entry)));
        observers.on_connection_change(|change| println!("{}", format_connection_change(change)));
        observers.on_notification_sound(|| {
            print!("\x07");
            let _ = std::io::stdout().flush();
        });

        tracing::info!("Monitoring {}", config.server.ws_url);
        println!("Type /help for commands");
        let driver_task = tokio::spawn(driver.run(config.session.auto_connect));

        let mut lines = spawn_line_reader();
        while let Some(line) = lines.recv().await {
            let input = match parse_input(&line) {
                Ok(input) => input,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };
            if let ControlFlow::Break(()) = handle_input(input, &session, &api).await? {
                break;
            }
        }

        session.shutdown()?;
        let manager = driver_task.await?;
        tracing::debug!("Monitor finished in state {}", manager.state());
        Ok(())
    }

    /// Read lines on a dedicated thread; rustyline blocks.
    ///
    /// The channel closes on EOF or Ctrl-D, which ends the monitor.
    fn spawn_line_reader() -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let mut editor = match DefaultEditor::new() {
                Ok(editor) => editor,
                Err(e) => {
                    tracing::error!("Failed to initialize line editor: {}", e);
                    return;
                }
            };
            loop {
                match editor.readline("") {
                    Ok(line) => {
                        let _ = editor.add_history_entry(line.as_str());
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                    Err(e) => {
                        tracing::error!("Input error: {}", e);
                        break;
                    }
                }
            }
        });
        rx
    }
}

/// One-shot backend REST commands
pub mod backend {
    //! Each handler performs one request, prints the result and returns.

    use std::time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::error::ObdWatchError;

    fn client(config: &Config) -> Result<BackendClient> {
        BackendClient::new(
            config.api_base()?,
            Duration::from_secs(config.server.request_timeout_secs),
        )
    }

    /// `obdwatch ports`
    pub async fn list_ports(config: &Config, json: bool) -> Result<()> {
        let ports = client(config)?.list_ports().await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&ports)?);
        } else {
            print_ports(&ports);
        }
        Ok(())
    }

    /// `obdwatch connect`
    pub async fn connect_serial(config: &Config, port: &str, baud: u32) -> Result<()> {
        let status = client(config)?.connect_serial(port, baud).await?;
        report_status("Serial connect", status.success, &status.message)
    }

    /// `obdwatch disconnect`
    pub async fn disconnect_serial(config: &Config) -> Result<()> {
        let status = client(config)?.disconnect_serial().await?;
        report_status("Serial disconnect", status.success, &status.message)
    }

    /// `obdwatch clear`
    pub async fn clear(config: &Config) -> Result<()> {
        let cleared = client(config)?.clear_data().await?;
        report_status("Clear", cleared, "")
    }

    /// `obdwatch export`
    pub async fn export(config: &Config) -> Result<()> {
        let summary = client(config)?.export_data().await?;
        println!("{} records", summary.count);
        for (key, value) in &summary.extra {
            if !value.is_array() && !value.is_object() {
                println!("{}: {}", key, value);
            }
        }
        Ok(())
    }

    /// `obdwatch chart`
    pub async fn chart(config: &Config) -> Result<()> {
        match client(config)?.chart().await? {
            ChartPayload::Chart(chart) => println!("{}", serde_json::to_string_pretty(&chart)?),
            ChartPayload::Unavailable(reason) => {
                println!("{} {}", "Chart unavailable:".yellow(), reason)
            }
        }
        Ok(())
    }

    fn report_status(action: &str, success: bool, message: &str) -> Result<()> {
        if success {
            println!("{} {}", format!("{} succeeded.", action).green(), message);
            Ok(())
        } else {
            Err(ObdWatchError::Api(format!("{} failed: {}", action, message)).into())
        }
    }
}
