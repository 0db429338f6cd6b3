//! Tokio-backed [`Scheduler`]
//!
//! Each timer is a spawned task that sleeps and then posts
//! [`SessionEvent::TimerFired`] onto the driver's queue. Cancelling aborts
//! the task, so a cancelled timer does not post anything. A firing that
//! races with cancellation is still discarded by the session, which only
//! acts on timer ids it currently holds.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::runtime::SessionEvent;
use crate::session::scheduler::{Scheduler, TimerId};

/// Scheduler that delivers timers through the session event queue
#[derive(Debug)]
pub struct TokioScheduler {
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    next_id: u64,
    timers: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    /// Create a scheduler posting to `events_tx`
    pub fn new(events_tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            events_tx,
            next_id: 0,
            timers: HashMap::new(),
        }
    }

    /// Timers spawned and not yet finished or cancelled
    pub fn active(&self) -> usize {
        self.timers.values().filter(|h| !h.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.timers.retain(|_, handle| !handle.is_finished());

        self.next_id += 1;
        let id = TimerId(self.next_id);
        let events_tx = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events_tx.send(SessionEvent::TimerFired(id));
        });
        self.timers.insert(id, handle);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_posts_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);
        let id = scheduler.schedule(Duration::from_secs(3));

        match rx.recv().await {
            Some(SessionEvent::TimerFired(fired)) => assert_eq!(fired, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_is_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);
        let cancelled = scheduler.schedule(Duration::from_secs(1));
        let kept = scheduler.schedule(Duration::from_secs(2));
        scheduler.cancel(cancelled);

        match rx.recv().await {
            Some(SessionEvent::TimerFired(fired)) => assert_eq!(fired, kept),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_timers_are_pruned() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);
        scheduler.schedule(Duration::from_millis(10));
        let _ = rx.recv().await;
        tokio::task::yield_now().await;

        scheduler.schedule(Duration::from_secs(30));
        assert_eq!(scheduler.timers.len(), 1);
        assert_eq!(scheduler.active(), 1);
    }
}
