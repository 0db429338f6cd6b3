//! Notifications the session publishes to the presentation layer
//!
//! The presentation shell subscribes by registering callbacks on
//! [`Observers`]. Callbacks receive shared references only; they can read
//! what happened but never mutate session state.

use std::fmt;

use crate::session::buffer::TelemetrySample;
use crate::session::channel::CloseCause;

/// Who authored a chat log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// Typed by the local user
    User,
    /// Produced by the backend's assistant
    Assistant,
}

/// Severity of a system log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Diagnostic detail, e.g. unrecognized frame types
    Debug,
    /// Normal operational output
    Info,
    /// Backend-reported errors
    Error,
}

/// One line for the chat or system log panels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// Chat conversation line
    Chat {
        /// Author of the line
        role: ChatRole,
        /// Message text
        text: String,
    },
    /// System log line
    System {
        /// Severity of the line
        severity: Severity,
        /// Message text
        text: String,
    },
}

impl LogEntry {
    /// Assistant chat line
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Chat {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }

    /// User chat line
    pub fn user(text: impl Into<String>) -> Self {
        Self::Chat {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    /// System line at the given severity
    pub fn system(severity: Severity, text: impl Into<String>) -> Self {
        Self::System {
            severity,
            text: text.into(),
        }
    }

    /// Text of the entry regardless of kind
    pub fn text(&self) -> &str {
        match self {
            Self::Chat { text, .. } | Self::System { text, .. } => text,
        }
    }
}

/// Why the session left the connected state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The user asked to disconnect; no reconnect follows
    Manual,
    /// The channel failed or was closed; a reconnect is scheduled
    ChannelClosed(CloseCause),
}

/// Connection status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionChange {
    /// A channel opened and the session is live
    Connected,
    /// The session is no longer live
    Disconnected(DisconnectReason),
}

type SampleCallback = Box<dyn FnMut(&TelemetrySample) + Send>;
type LogCallback = Box<dyn FnMut(&LogEntry) + Send>;
type ConnectionCallback = Box<dyn FnMut(&ConnectionChange) + Send>;
type SoundCallback = Box<dyn FnMut() + Send>;

/// Registered presentation-layer callbacks
#[derive(Default)]
pub struct Observers {
    sample_added: Vec<SampleCallback>,
    log_entry: Vec<LogCallback>,
    connection_change: Vec<ConnectionCallback>,
    notification_sound: Vec<SoundCallback>,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("sample_added", &self.sample_added.len())
            .field("log_entry", &self.log_entry.len())
            .field("connection_change", &self.connection_change.len())
            .field("notification_sound", &self.notification_sound.len())
            .finish()
    }
}

impl Observers {
    /// Create an empty set of observers
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after a sample is pushed into the buffer
    pub fn on_sample_added<F>(&mut self, callback: F)
    where
        F: FnMut(&TelemetrySample) + Send + 'static,
    {
        self.sample_added.push(Box::new(callback));
    }

    /// Called for every chat or system log line
    pub fn on_log_entry<F>(&mut self, callback: F)
    where
        F: FnMut(&LogEntry) + Send + 'static,
    {
        self.log_entry.push(Box::new(callback));
    }

    /// Called when the session connects or disconnects
    pub fn on_connection_change<F>(&mut self, callback: F)
    where
        F: FnMut(&ConnectionChange) + Send + 'static,
    {
        self.connection_change.push(Box::new(callback));
    }

    /// Called when a new sample should ring the notification sound
    pub fn on_notification_sound<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.notification_sound.push(Box::new(callback));
    }

    pub(crate) fn sample_added(&mut self, sample: &TelemetrySample) {
        for callback in &mut self.sample_added {
            callback(sample);
        }
    }

    pub(crate) fn log_entry(&mut self, entry: &LogEntry) {
        for callback in &mut self.log_entry {
            callback(entry);
        }
    }

    pub(crate) fn connection_change(&mut self, change: &ConnectionChange) {
        for callback in &mut self.connection_change {
            callback(change);
        }
    }

    pub(crate) fn notification_sound(&mut self) {
        for callback in &mut self.notification_sound {
            callback();
        }
    }
}
