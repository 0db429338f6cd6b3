//! Channel abstraction
//!
//! A [`Channel`] is one open, bidirectional connection to the backend. A
//! [`Connector`] starts opening channels; the outcome arrives later as an
//! event on the session (`on_channel_opened` or `on_channel_closed`) tagged
//! with the [`ChannelId`] of the attempt. The session uses the id to discard
//! events from attempts it has already abandoned.

use std::fmt;

use crate::error::Result;

/// Identifies one connect attempt and the channel it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a channel went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// The connection could not be established
    ConnectFailed(String),
    /// The peer closed the connection
    ClosedByPeer,
    /// The connection failed after it was open
    Error(String),
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed(reason) => write!(f, "connect failed: {}", reason),
            Self::ClosedByPeer => write!(f, "closed by peer"),
            Self::Error(reason) => write!(f, "channel error: {}", reason),
        }
    }
}

/// Write half of an open channel, owned by the session while connected.
pub trait Channel: Send + fmt::Debug {
    /// Queue one text frame for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ObdWatchError::Transport`] when the channel
    /// can no longer accept frames.
    fn send_text(&mut self, frame: String) -> Result<()>;

    /// Close the channel. Further events from it are ignored by the session.
    fn close(&mut self);
}

/// Opens channels on request.
pub trait Connector: Send {
    /// Start opening the channel identified by `id`.
    ///
    /// # Errors
    ///
    /// An error means the attempt could not even be started; the session
    /// treats it like an immediate connect failure.
    fn open(&mut self, id: ChannelId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_cause_display() {
        assert_eq!(
            CloseCause::ConnectFailed("refused".to_string()).to_string(),
            "connect failed: refused"
        );
        assert_eq!(CloseCause::ClosedByPeer.to_string(), "closed by peer");
        assert_eq!(
            CloseCause::Error("reset".to_string()).to_string(),
            "channel error: reset"
        );
    }

    #[test]
    fn test_channel_id_display() {
        assert_eq!(ChannelId(7).to_string(), "#7");
    }
}
