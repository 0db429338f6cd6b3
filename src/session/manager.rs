//! Session lifecycle: connect, reconnect, heartbeat and send
//!
//! [`ConnectionManager`] is a synchronous state machine. It never blocks and
//! never spawns; every external happening (channel opened, frame received,
//! channel closed, timer fired) is delivered to it as a method call and
//! handled to completion before the next one.
//!
//! ```text
//! Disconnected --connect()--> Connecting --opened--> Connected
//!      ^                           |                     |
//!      +------- closed/failed -----+---------------------+
//! ```
//!
//! A failure-driven close schedules one reconnect after the configured delay.
//! A manual [`ConnectionManager::disconnect`] does not.

use std::time::Duration;

use crate::error::{ObdWatchError, Result};
use crate::session::buffer::{TelemetryBuffer, DEFAULT_BUFFER_CAPACITY};
use crate::session::channel::{Channel, ChannelId, CloseCause, Connector};
use crate::session::events::{ConnectionChange, DisconnectReason, Observers};
use crate::session::heartbeat::{HeartbeatMonitor, DEFAULT_HEARTBEAT_INTERVAL};
use crate::session::protocol::OutboundCommand;
use crate::session::router::{MessageRouter, RouteOutcome};
use crate::session::scheduler::{Scheduler, TimerId};
use crate::session::SessionState;

/// Default wait before reopening a failed channel
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Tunables for a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Wait before reopening a failed channel
    pub reconnect_delay: Duration,
    /// Interval between heartbeat pings
    pub heartbeat_interval: Duration,
    /// Telemetry buffer capacity
    pub buffer_capacity: usize,
    /// Request the notification sound for every sample
    pub sound_on_sample: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            sound_on_sample: false,
        }
    }
}

/// Owns the session state, the single live channel and all traffic.
pub struct ConnectionManager {
    state: SessionState,
    connector: Box<dyn Connector>,
    scheduler: Box<dyn Scheduler>,
    /// Attempt the session currently cares about (Connecting or Connected)
    current: Option<ChannelId>,
    channel: Option<Box<dyn Channel>>,
    next_channel_id: u64,
    reconnect_timer: Option<TimerId>,
    reconnect_delay: Duration,
    heartbeat: HeartbeatMonitor,
    router: MessageRouter,
    observers: Observers,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("current", &self.current)
            .field("reconnect_timer", &self.reconnect_timer)
            .field("heartbeat", &self.heartbeat)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a disconnected session.
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::InvalidCapacity`] when the buffer capacity is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use obdwatch::session::fake::FakeNetwork;
    /// use obdwatch::session::scheduler::ManualScheduler;
    /// use obdwatch::session::{ConnectionManager, SessionSettings, SessionState};
    ///
    /// let network = FakeNetwork::new();
    /// let manager = ConnectionManager::new(
    ///     SessionSettings::default(),
    ///     Box::new(network.connector()),
    ///     Box::new(ManualScheduler::new()),
    /// )
    /// .unwrap();
    /// assert_eq!(manager.state(), SessionState::Disconnected);
    /// ```
    pub fn new(
        settings: SessionSettings,
        connector: Box<dyn Connector>,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<Self> {
        let buffer = TelemetryBuffer::new(settings.buffer_capacity)?;
        Ok(Self {
            state: SessionState::Disconnected,
            connector,
            scheduler,
            current: None,
            channel: None,
            next_channel_id: 0,
            reconnect_timer: None,
            reconnect_delay: settings.reconnect_delay,
            heartbeat: HeartbeatMonitor::new(settings.heartbeat_interval),
            router: MessageRouter::new(buffer, settings.sound_on_sample),
            observers: Observers::new(),
        })
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Registered presentation callbacks
    pub fn observers_mut(&mut self) -> &mut Observers {
        &mut self.observers
    }

    /// Read access to the telemetry buffer
    pub fn buffer(&self) -> &TelemetryBuffer {
        self.router.buffer()
    }

    /// Whether a failure-driven reconnect is waiting to fire
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    /// Whether the heartbeat timer is armed
    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    /// The attempt id of the channel being opened or in use
    pub fn current_channel(&self) -> Option<ChannelId> {
        self.current
    }

    /// Start opening a channel. No-op while connecting or connected.
    ///
    /// A pending reconnect timer is cancelled first so that a manual connect
    /// and a scheduled reconnect can never open two channels.
    pub fn connect(&mut self) {
        if self.state != SessionState::Disconnected {
            tracing::debug!("connect() ignored, session is {:?}", self.state);
            return;
        }
        self.cancel_reconnect();
        self.open_channel();
    }

    /// Close the session on user request. No reconnect is scheduled.
    pub fn disconnect(&mut self) {
        self.cancel_reconnect();
        if self.state == SessionState::Disconnected {
            return;
        }

        tracing::info!("Disconnecting on request");
        self.heartbeat.stop(self.scheduler.as_mut());
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.current = None;
        self.state = SessionState::Disconnected;
        self.observers
            .connection_change(&ConnectionChange::Disconnected(DisconnectReason::Manual));
    }

    /// A channel finished opening.
    ///
    /// Channels for attempts the session no longer tracks are closed and
    /// dropped immediately.
    pub fn on_channel_opened(&mut self, id: ChannelId, mut channel: Box<dyn Channel>) {
        if self.state != SessionState::Connecting || self.current != Some(id) {
            tracing::debug!("Discarding stale channel {}", id);
            channel.close();
            return;
        }

        tracing::info!("Channel {} connected", id);
        self.channel = Some(channel);
        self.state = SessionState::Connected;
        self.observers.connection_change(&ConnectionChange::Connected);
        self.heartbeat.start(self.scheduler.as_mut());
    }

    /// A channel closed or failed to open.
    ///
    /// Moves the session to `Disconnected` and schedules a single reconnect.
    /// Reports for attempts the session no longer tracks are ignored.
    pub fn on_channel_closed(&mut self, id: ChannelId, cause: CloseCause) {
        if self.current != Some(id) {
            tracing::debug!("Ignoring close of stale channel {}: {}", id, cause);
            return;
        }

        tracing::warn!("Channel {} lost: {}", id, cause);
        self.heartbeat.stop(self.scheduler.as_mut());
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.current = None;
        self.state = SessionState::Disconnected;
        self.observers
            .connection_change(&ConnectionChange::Disconnected(DisconnectReason::ChannelClosed(
                cause,
            )));
        self.schedule_reconnect();
    }

    /// An inbound frame arrived on channel `id`
    pub fn on_frame(&mut self, id: ChannelId, payload: &str) -> Option<RouteOutcome> {
        if self.state != SessionState::Connected || self.current != Some(id) {
            tracing::debug!("Dropping frame from stale channel {}", id);
            return None;
        }
        Some(self.router.route(payload, &mut self.observers))
    }

    /// A scheduled timer fired
    pub fn on_timer(&mut self, id: TimerId) {
        if self.reconnect_timer == Some(id) {
            self.reconnect_timer = None;
            tracing::info!("Reconnecting");
            self.connect();
            return;
        }

        if self.heartbeat.on_timer(id, self.scheduler.as_mut()) {
            if let Err(e) = self.send(OutboundCommand::Ping) {
                tracing::debug!("Heartbeat ping not sent: {}", e);
            }
            return;
        }

        tracing::trace!("Ignoring stale timer {:?}", id);
    }

    /// Send a command over the live channel.
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::NotConnected`] unless the session is
    /// connected; the command is dropped. Returns
    /// [`ObdWatchError::Transport`] if the channel rejects the frame.
    pub fn send(&mut self, command: OutboundCommand) -> Result<()> {
        let channel = match (self.state, self.channel.as_mut()) {
            (SessionState::Connected, Some(channel)) => channel,
            _ => return Err(ObdWatchError::NotConnected.into()),
        };

        let frame = command.to_frame()?;
        tracing::debug!("Sending {} frame", command.kind());
        channel.send_text(frame)
    }

    /// Empty the telemetry buffer on an explicit clear request
    pub fn clear_buffer(&mut self) {
        self.router.buffer_mut().clear();
        tracing::info!("Telemetry buffer cleared");
    }

    /// Change the buffer capacity; applies on the next sample
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::InvalidCapacity`] when `capacity` is out of range.
    pub fn set_buffer_capacity(&mut self, capacity: usize) -> Result<()> {
        self.router.buffer_mut().set_capacity(capacity)
    }

    /// Toggle the per-sample notification sound
    pub fn set_sound_on_sample(&mut self, enabled: bool) {
        self.router.set_sound_on_sample(enabled);
    }

    fn open_channel(&mut self) {
        self.next_channel_id += 1;
        let id = ChannelId(self.next_channel_id);
        self.current = Some(id);
        self.state = SessionState::Connecting;
        tracing::info!("Opening channel {}", id);

        if let Err(e) = self.connector.open(id) {
            self.on_channel_closed(id, CloseCause::ConnectFailed(e.to_string()));
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_timer.is_some() {
            tracing::debug!("Reconnect already pending");
            return;
        }
        tracing::info!("Reconnecting in {:?}", self.reconnect_delay);
        self.reconnect_timer = Some(self.scheduler.schedule(self.reconnect_delay));
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            self.scheduler.cancel(timer);
            tracing::debug!("Pending reconnect cancelled");
        }
    }
}
