//! Session and dispatch core
//!
//! This module holds everything that has state and failure handling:
//!
//! - [`buffer`]: bounded FIFO of [`TelemetrySample`]s
//! - [`router`]: inbound frame classification and dispatch
//! - [`heartbeat`]: periodic ping timer
//! - [`manager`]: the [`ConnectionManager`] state machine tying it together
//! - [`protocol`]: the JSON wire format
//! - [`scheduler`] and [`channel`]: the seams to time and I/O
//! - [`events`]: callbacks the presentation layer subscribes to
//! - [`fake`]: in-process connector for tests and simulations
//!
//! The core is synchronous and single-threaded. The tokio driver in
//! [`crate::runtime`] feeds it events one at a time.

pub mod buffer;
pub mod channel;
pub mod events;
pub mod fake;
pub mod heartbeat;
pub mod manager;
pub mod protocol;
pub mod router;
pub mod scheduler;

pub use buffer::{TelemetryBuffer, TelemetrySample, TelemetryStats};
pub use channel::{Channel, ChannelId, CloseCause, Connector};
pub use events::{ChatRole, ConnectionChange, DisconnectReason, LogEntry, Observers, Severity};
pub use manager::{ConnectionManager, SessionSettings};
pub use protocol::{Decoded, InboundMessage, OutboundCommand};
pub use scheduler::{ManualScheduler, Scheduler, TimerId};

/// Lifecycle state of the logical session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No channel; a reconnect may be pending
    Disconnected,
    /// A channel is being opened
    Connecting,
    /// A channel is open and traffic flows
    Connected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(label)
    }
}
