//! Periodic liveness pings
//!
//! The monitor only owns the timer. It does not send anything itself: when
//! its tick fires, [`HeartbeatMonitor::on_timer`] re-arms the timer and tells
//! the caller to send a ping over the live channel. A missing pong is not
//! treated as a failure; only the channel's own close event ends a session.

use std::time::Duration;

use crate::session::scheduler::{Scheduler, TimerId};

/// Default interval between pings
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Owns the heartbeat timer while the session is connected
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Duration,
    timer: Option<TimerId>,
}

impl HeartbeatMonitor {
    /// Create a stopped monitor
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: None,
        }
    }

    /// Arm the heartbeat timer. Restarting replaces any previous timer.
    pub fn start(&mut self, scheduler: &mut dyn Scheduler) {
        self.stop(scheduler);
        self.timer = Some(scheduler.schedule(self.interval));
        tracing::debug!("Heartbeat started, interval {:?}", self.interval);
    }

    /// Cancel the heartbeat timer
    pub fn stop(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(timer) = self.timer.take() {
            scheduler.cancel(timer);
            tracing::debug!("Heartbeat stopped");
        }
    }

    /// Handle a fired timer.
    ///
    /// Returns `true` when `id` is the current heartbeat tick, in which case
    /// the next tick has already been scheduled and a ping is due.
    pub fn on_timer(&mut self, id: TimerId, scheduler: &mut dyn Scheduler) -> bool {
        if self.timer != Some(id) {
            return false;
        }
        self.timer = Some(scheduler.schedule(self.interval));
        true
    }

    /// Whether a tick is currently scheduled
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Interval between pings
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}
