//! Interactive input parser for the monitor
//!
//! Lines typed into the monitor are either slash commands or text for the
//! backend. Plain text goes to the vehicle as a serial command; `/chat`
//! sends a question to the assistant instead.
//!
//! Commands are prefixed with `/` and are case-insensitive. Their arguments
//! are not.

use thiserror::Error;

use crate::session::buffer::MAX_BUFFER_CAPACITY;

/// Errors that can occur when parsing monitor input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unusable argument
    #[error("Invalid argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    InvalidArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// One parsed line of monitor input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// Send text to the vehicle's serial interface
    Serial(String),
    /// Ask the assistant a question
    Chat(String),
    /// Send a heartbeat ping now
    Ping,
    /// Clear backend data, then the local buffer on success
    Clear,
    /// Change the buffer capacity
    Capacity(usize),
    /// Open the session
    Connect,
    /// Close the session without reconnecting
    Disconnect,
    /// List the backend's serial ports
    Ports,
    /// Show buffer statistics
    Stats,
    /// Show help
    Help,
    /// Leave the monitor
    Quit,
    /// Blank line
    Empty,
}

/// Parse one line of monitor input
///
/// # Errors
///
/// Returns [`InputError`] for unknown slash commands and bad arguments.
///
/// # Examples
///
/// ```
/// use obdwatch::commands::input::{parse_input, UserInput};
///
/// assert_eq!(parse_input("010C").unwrap(), UserInput::Serial("010C".to_string()));
/// assert_eq!(
///     parse_input("/chat is 900 rpm normal at idle?").unwrap(),
///     UserInput::Chat("is 900 rpm normal at idle?".to_string())
/// );
/// assert_eq!(parse_input("/capacity 50").unwrap(), UserInput::Capacity(50));
/// assert!(parse_input("/frobnicate").is_err());
/// ```
pub fn parse_input(line: &str) -> Result<UserInput, InputError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(UserInput::Empty);
    }
    if !trimmed.starts_with('/') {
        return Ok(UserInput::Serial(trimmed.to_string()));
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command.to_lowercase(), rest.trim()),
        None => (trimmed.to_lowercase(), ""),
    };

    match command.as_str() {
        "/chat" | "/ask" => {
            if rest.is_empty() {
                return Err(InputError::MissingArgument {
                    command: "/chat".to_string(),
                    usage: "/chat <message>".to_string(),
                });
            }
            Ok(UserInput::Chat(rest.to_string()))
        }
        "/capacity" => {
            if rest.is_empty() {
                return Err(InputError::MissingArgument {
                    command: "/capacity".to_string(),
                    usage: "/capacity <samples>".to_string(),
                });
            }
            match rest.parse::<usize>() {
                Ok(capacity) if (1..=MAX_BUFFER_CAPACITY).contains(&capacity) => {
                    Ok(UserInput::Capacity(capacity))
                }
                _ => Err(InputError::InvalidArgument {
                    command: "/capacity".to_string(),
                    arg: rest.to_string(),
                }),
            }
        }
        "/ping" => Ok(UserInput::Ping),
        "/clear" => Ok(UserInput::Clear),
        "/connect" => Ok(UserInput::Connect),
        "/disconnect" => Ok(UserInput::Disconnect),
        "/ports" => Ok(UserInput::Ports),
        "/stats" => Ok(UserInput::Stats),
        "/help" | "/?" => Ok(UserInput::Help),
        "/quit" | "/exit" => Ok(UserInput::Quit),
        other => Err(InputError::UnknownCommand(other.to_string())),
    }
}

/// Help text listing every monitor command
pub fn help_text() -> &'static str {
    "\
Commands:
  <text>              Send <text> to the vehicle as a serial command
  /chat <message>     Ask the assistant (alias: /ask)
  /ping               Send a heartbeat ping now
  /clear              Clear backend data and the local buffer
  /capacity <n>       Keep at most <n> samples
  /connect            Open the session
  /disconnect         Close the session (no automatic reconnect)
  /ports              List serial ports on the backend
  /stats              Show buffer statistics
  /help               Show this help
  /quit               Leave the monitor"
}
