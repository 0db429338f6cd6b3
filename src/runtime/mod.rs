//! Tokio driver for the session core
//!
//! [`SessionDriver`] owns the [`ConnectionManager`] and a single event queue.
//! Channel tasks, timer tasks and user requests all post [`SessionEvent`]s to
//! that queue, and the driver applies them one at a time, so the manager is
//! only ever touched from one task.
//!
//! ```text
//! WsConnector task --Opened/Frame/Closed--+
//! TokioScheduler  --TimerFired------------+--> queue --> SessionDriver::run
//! SessionHandle   --Request---------------+              (ConnectionManager)
//! ```

pub mod timer;
pub mod websocket;

use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::error::{ObdWatchError, Result};
use crate::session::buffer::TelemetryStats;
use crate::session::channel::{Channel, ChannelId, CloseCause, Connector};
use crate::session::events::Observers;
use crate::session::protocol::OutboundCommand;
use crate::session::scheduler::{Scheduler, TimerId};
use crate::session::{ConnectionManager, SessionSettings, SessionState};

pub use timer::TokioScheduler;
pub use websocket::{WsChannel, WsConnector};

/// Everything the driver reacts to
#[derive(Debug)]
pub enum SessionEvent {
    /// A connect attempt produced an open channel
    Opened {
        /// Attempt id
        id: ChannelId,
        /// Write handle for the channel
        channel: Box<dyn Channel>,
    },
    /// A text frame arrived
    Frame {
        /// Channel the frame arrived on
        id: ChannelId,
        /// Frame payload
        payload: String,
    },
    /// A channel ended or failed to open
    Closed {
        /// Attempt id
        id: ChannelId,
        /// Why it ended
        cause: CloseCause,
    },
    /// A scheduled timer fired
    TimerFired(TimerId),
    /// A request from the user-facing shell
    Request(SessionRequest),
}

/// Requests posted through a [`SessionHandle`]
#[derive(Debug)]
pub enum SessionRequest {
    /// Open the session if it is disconnected
    Connect,
    /// Close the session without reconnecting
    Disconnect,
    /// Send a command; the outcome is reported on `reply`
    Send {
        /// Command to send
        command: OutboundCommand,
        /// Receives the send result
        reply: oneshot::Sender<Result<()>>,
    },
    /// Empty the telemetry buffer
    ClearBuffer,
    /// Change the telemetry buffer capacity
    SetCapacity {
        /// New capacity
        capacity: usize,
        /// Receives the validation result
        reply: oneshot::Sender<Result<()>>,
    },
    /// Report buffer statistics
    Stats(oneshot::Sender<TelemetryStats>),
    /// Report the session state
    State(oneshot::Sender<SessionState>),
    /// Stop the driver loop
    Shutdown,
}

/// Cloneable handle for posting requests to a running driver
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    fn post(&self, request: SessionRequest) -> Result<()> {
        self.events_tx
            .send(SessionEvent::Request(request))
            .map_err(|_| ObdWatchError::Transport("session driver has stopped".to_string()))?;
        Ok(())
    }

    async fn ask<T>(&self, request: SessionRequest, reply_rx: oneshot::Receiver<T>) -> Result<T> {
        self.post(request)?;
        reply_rx
            .await
            .map_err(|_| ObdWatchError::Transport("session driver dropped the request".to_string()).into())
    }

    /// Ask the session to connect
    pub fn connect(&self) -> Result<()> {
        self.post(SessionRequest::Connect)
    }

    /// Ask the session to disconnect
    pub fn disconnect(&self) -> Result<()> {
        self.post(SessionRequest::Disconnect)
    }

    /// Send a command and wait for the synchronous outcome
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::NotConnected`] when the session is not
    /// connected, or [`ObdWatchError::Transport`] when the driver is gone.
    pub async fn send(&self, command: OutboundCommand) -> Result<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.ask(SessionRequest::Send { command, reply }, reply_rx)
            .await?
    }

    /// Empty the telemetry buffer
    pub fn clear_buffer(&self) -> Result<()> {
        self.post(SessionRequest::ClearBuffer)
    }

    /// Change the buffer capacity
    pub async fn set_capacity(&self, capacity: usize) -> Result<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.ask(SessionRequest::SetCapacity { capacity, reply }, reply_rx)
            .await?
    }

    /// Current buffer statistics
    pub async fn stats(&self) -> Result<TelemetryStats> {
        let (reply, reply_rx) = oneshot::channel();
        self.ask(SessionRequest::Stats(reply), reply_rx).await
    }

    /// Current session state
    pub async fn state(&self) -> Result<SessionState> {
        let (reply, reply_rx) = oneshot::channel();
        self.ask(SessionRequest::State(reply), reply_rx).await
    }

    /// Stop the driver loop
    pub fn shutdown(&self) -> Result<()> {
        self.post(SessionRequest::Shutdown)
    }
}

/// Runs a [`ConnectionManager`] on a tokio task
#[derive(Debug)]
pub struct SessionDriver {
    manager: ConnectionManager,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionDriver {
    /// Build a driver that talks WebSocket to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::InvalidCapacity`] for an out-of-range buffer capacity.
    pub fn websocket(settings: SessionSettings, url: Url) -> Result<(Self, SessionHandle)> {
        Self::with_connector(settings, |events_tx| {
            Box::new(WsConnector::new(url, events_tx))
        })
    }

    /// Build a driver around a custom connector.
    ///
    /// `make_connector` receives the event queue sender so the connector can
    /// post channel events.
    pub fn with_connector<F>(settings: SessionSettings, make_connector: F) -> Result<(Self, SessionHandle)>
    where
        F: FnOnce(mpsc::UnboundedSender<SessionEvent>) -> Box<dyn Connector>,
    {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let scheduler: Box<dyn Scheduler> = Box::new(TokioScheduler::new(events_tx.clone()));
        let connector = make_connector(events_tx.clone());
        let manager = ConnectionManager::new(settings, connector, scheduler)?;

        Ok((
            Self { manager, events_rx },
            SessionHandle { events_tx },
        ))
    }

    /// Presentation callbacks; register before calling [`SessionDriver::run`]
    pub fn observers_mut(&mut self) -> &mut Observers {
        self.manager.observers_mut()
    }

    /// Process events until shutdown. Connects first when `auto_connect` is set.
    ///
    /// Returns the manager so callers can inspect the final state.
    pub async fn run(mut self, auto_connect: bool) -> ConnectionManager {
        if auto_connect {
            self.manager.connect();
        }

        while let Some(event) = self.events_rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        self.manager.disconnect();
        tracing::info!("Session driver stopped");
        self.manager
    }

    /// Apply one event. Returns `false` on shutdown.
    fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Opened { id, channel } => self.manager.on_channel_opened(id, channel),
            SessionEvent::Frame { id, payload } => {
                self.manager.on_frame(id, &payload);
            }
            SessionEvent::Closed { id, cause } => self.manager.on_channel_closed(id, cause),
            SessionEvent::TimerFired(id) => self.manager.on_timer(id),
            SessionEvent::Request(request) => return self.handle_request(request),
        }
        true
    }

    fn handle_request(&mut self, request: SessionRequest) -> bool {
        match request {
            SessionRequest::Connect => self.manager.connect(),
            SessionRequest::Disconnect => self.manager.disconnect(),
            SessionRequest::Send { command, reply } => {
                let _ = reply.send(self.manager.send(command));
            }
            SessionRequest::ClearBuffer => self.manager.clear_buffer(),
            SessionRequest::SetCapacity { capacity, reply } => {
                let _ = reply.send(self.manager.set_buffer_capacity(capacity));
            }
            SessionRequest::Stats(reply) => {
                let _ = reply.send(self.manager.buffer().stats());
            }
            SessionRequest::State(reply) => {
                let _ = reply.send(self.manager.state());
            }
            SessionRequest::Shutdown => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::FakeNetwork;
    use std::time::Duration;

    /// Connector that records attempts on a [`FakeNetwork`] and immediately
    /// posts an open channel for each one.
    struct AutoOpen {
        network: FakeNetwork,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    }

    impl Connector for AutoOpen {
        fn open(&mut self, id: ChannelId) -> Result<()> {
            self.network.connector().open(id)?;
            let _ = self.events_tx.send(SessionEvent::Opened {
                id,
                channel: self.network.channel(id),
            });
            Ok(())
        }
    }

    fn driver(network: &FakeNetwork) -> (SessionDriver, SessionHandle) {
        let network = network.clone();
        SessionDriver::with_connector(SessionSettings::default(), move |events_tx| {
            Box::new(AutoOpen { network, events_tx })
        })
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_through_handle() {
        let network = FakeNetwork::new();
        let (driver, handle) = driver(&network);
        let task = tokio::spawn(driver.run(true));

        while handle.state().await.unwrap() != SessionState::Connected {
            tokio::task::yield_now().await;
        }
        handle.send(OutboundCommand::serial("010C")).await.unwrap();
        handle.shutdown().unwrap();
        let manager = task.await.unwrap();

        assert_eq!(manager.state(), SessionState::Disconnected);
        assert_eq!(
            network.sent_frames(),
            vec![r#"{"type":"serial_command","command":"010C"}"#.to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_before_connect_is_rejected() {
        let network = FakeNetwork::new();
        let (driver, handle) = driver(&network);
        let task = tokio::spawn(driver.run(false));

        let err = handle.send(OutboundCommand::Ping).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ObdWatchError>(),
            Some(ObdWatchError::NotConnected)
        ));

        handle.shutdown().unwrap();
        task.await.unwrap();
        assert!(network.sent_frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_pings_on_interval() {
        let network = FakeNetwork::new();
        let (driver, handle) = driver(&network);
        let task = tokio::spawn(driver.run(true));

        tokio::time::sleep(Duration::from_secs(61)).await;
        handle.shutdown().unwrap();
        task.await.unwrap();

        assert_eq!(
            network.sent_frames(),
            vec![r#"{"type":"ping"}"#.to_string(), r#"{"type":"ping"}"#.to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_close() {
        let network = FakeNetwork::new();
        let (driver, handle) = driver(&network);
        let events_tx = handle.events_tx.clone();
        let task = tokio::spawn(driver.run(true));

        while handle.state().await.unwrap() != SessionState::Connected {
            tokio::task::yield_now().await;
        }
        events_tx
            .send(SessionEvent::Closed {
                id: ChannelId(1),
                cause: CloseCause::ClosedByPeer,
            })
            .unwrap();
        assert_eq!(handle.state().await.unwrap(), SessionState::Disconnected);

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(handle.state().await.unwrap(), SessionState::Connected);
        assert_eq!(network.attempts(), vec![ChannelId(1), ChannelId(2)]);

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_reports_stopped_driver() {
        let network = FakeNetwork::new();
        let (driver, handle) = driver(&network);
        drop(driver);
        assert!(handle.connect().is_err());
        assert!(handle.state().await.is_err());
    }
}
