//! In-process fake connector and channel
//!
//! [`FakeNetwork`] stands in for the backend in tests and simulations. It
//! records every connect attempt and every frame written to the channels it
//! hands out, without any real I/O.
//!
//! ```text
//! manager.connect() --> FakeConnector::open(id) --> network.attempts()
//! test: manager.on_channel_opened(id, network.channel(id))
//! manager.send(cmd) --> FakeChannel::send_text --> network.sent_frames()
//! ```
//!
//! # Example
//!
//! ```
//! use obdwatch::session::fake::FakeNetwork;
//! use obdwatch::session::channel::{Channel, ChannelId, Connector};
//!
//! let network = FakeNetwork::new();
//! let mut connector = network.connector();
//! connector.open(ChannelId(1)).unwrap();
//! assert_eq!(network.attempts(), vec![ChannelId(1)]);
//!
//! let mut channel = network.channel(ChannelId(1));
//! channel.send_text(r#"{"type":"ping"}"#.to_string()).unwrap();
//! assert_eq!(network.sent_frames(), vec![r#"{"type":"ping"}"#.to_string()]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ObdWatchError, Result};
use crate::session::channel::{Channel, ChannelId, Connector};

#[derive(Debug, Default)]
struct NetworkState {
    attempts: Vec<ChannelId>,
    sent: Vec<(ChannelId, String)>,
    closed: Vec<ChannelId>,
    refused: Vec<ChannelId>,
    refuse_open: bool,
}

/// Shared record of fake connect attempts and traffic
#[derive(Debug, Clone, Default)]
pub struct FakeNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl FakeNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A connector that records attempts on this network
    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            network: self.clone(),
        }
    }

    /// A channel whose traffic is recorded on this network
    pub fn channel(&self, id: ChannelId) -> Box<dyn Channel> {
        Box::new(FakeChannel {
            id,
            network: self.clone(),
            closed: false,
        })
    }

    /// Make subsequent `open` calls fail synchronously
    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse_open = refuse;
    }

    /// Every connect attempt in order, refused ones included
    pub fn attempts(&self) -> Vec<ChannelId> {
        self.lock().attempts.clone()
    }

    /// The most recent connect attempt
    pub fn last_attempt(&self) -> Option<ChannelId> {
        self.lock().attempts.last().copied()
    }

    /// Every frame written to any channel, in order
    pub fn sent_frames(&self) -> Vec<String> {
        self.lock().sent.iter().map(|(_, f)| f.clone()).collect()
    }

    /// Frames written to one channel
    pub fn sent_on(&self, id: ChannelId) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|(channel, _)| *channel == id)
            .map(|(_, f)| f.clone())
            .collect()
    }

    /// Channels closed from the client side
    pub fn closed(&self) -> Vec<ChannelId> {
        self.lock().closed.clone()
    }

    /// Connect attempts rejected while [`FakeNetwork::refuse_connections`] was on
    pub fn refused(&self) -> Vec<ChannelId> {
        self.lock().refused.clone()
    }
}

/// Connector half of a [`FakeNetwork`]
#[derive(Debug, Clone)]
pub struct FakeConnector {
    network: FakeNetwork,
}

impl Connector for FakeConnector {
    fn open(&mut self, id: ChannelId) -> Result<()> {
        let mut state = self.network.lock();
        state.attempts.push(id);
        if state.refuse_open {
            state.refused.push(id);
            return Err(ObdWatchError::Transport("connection refused".to_string()).into());
        }
        Ok(())
    }
}

#[derive(Debug)]
struct FakeChannel {
    id: ChannelId,
    network: FakeNetwork,
    closed: bool,
}

impl Channel for FakeChannel {
    fn send_text(&mut self, frame: String) -> Result<()> {
        if self.closed {
            return Err(ObdWatchError::Transport("channel closed".to_string()).into());
        }
        self.network.lock().sent.push((self.id, frame));
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.network.lock().closed.push(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_channel_rejects_frames() {
        let network = FakeNetwork::new();
        let mut channel = network.channel(ChannelId(1));
        channel.close();
        channel.close();

        assert!(channel.send_text("x".to_string()).is_err());
        assert_eq!(network.closed(), vec![ChannelId(1)]);
    }

    #[test]
    fn test_refused_connections() {
        let network = FakeNetwork::new();
        network.refuse_connections(true);
        let mut connector = network.connector();
        assert!(connector.open(ChannelId(1)).is_err());
        network.refuse_connections(false);
        assert!(connector.open(ChannelId(2)).is_ok());

        assert_eq!(network.attempts(), vec![ChannelId(1), ChannelId(2)]);
        assert_eq!(network.refused(), vec![ChannelId(1)]);
    }

    #[test]
    fn test_sent_on_filters_by_channel() {
        let network = FakeNetwork::new();
        let mut a = network.channel(ChannelId(1));
        let mut b = network.channel(ChannelId(2));
        a.send_text("a".to_string()).unwrap();
        b.send_text("b".to_string()).unwrap();
        assert_eq!(network.sent_on(ChannelId(2)), vec!["b".to_string()]);
    }
}
