//! Timer scheduling abstraction
//!
//! The session core never sleeps or spawns. It asks a [`Scheduler`] for a
//! one-shot timer and later receives the fired [`TimerId`] back through
//! [`ConnectionManager::on_timer`](crate::session::ConnectionManager::on_timer).
//! Production code uses the tokio-backed scheduler in
//! [`crate::runtime`]; tests use [`ManualScheduler`] to move time forward
//! deterministically.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Opaque identifier for a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Source of cancellable one-shot timers.
pub trait Scheduler: Send {
    /// Arrange for `id` to be delivered once `delay` has elapsed.
    fn schedule(&mut self, delay: Duration) -> TimerId;

    /// Invalidate a pending timer. Cancelling an unknown or already fired
    /// timer is a no-op.
    fn cancel(&mut self, id: TimerId);
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    pending: BTreeMap<TimerId, Duration>,
}

/// Deterministic scheduler driven by explicit calls to [`ManualScheduler::advance`].
///
/// Clones share state, so a test can hand one clone to the
/// [`ConnectionManager`](crate::session::ConnectionManager) and keep another
/// to inspect and advance time.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use obdwatch::session::scheduler::{ManualScheduler, Scheduler};
///
/// let clock = ManualScheduler::new();
/// let mut scheduler = clock.clone();
/// let id = scheduler.schedule(Duration::from_secs(3));
///
/// assert!(clock.advance(Duration::from_secs(2)).is_empty());
/// assert_eq!(clock.advance(Duration::from_secs(1)), vec![id]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    /// Create a scheduler at time zero with no pending timers
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move time forward and return every timer that fell due, earliest first.
    ///
    /// Fired timers are removed from the pending set; the caller is expected
    /// to deliver them to the session in the returned order.
    pub fn advance(&self, by: Duration) -> Vec<TimerId> {
        let mut state = self.lock();
        state.now += by;
        let now = state.now;

        let mut due: Vec<(Duration, TimerId)> = state
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (*deadline, *id))
            .collect();
        due.sort();

        for (_, id) in &due {
            state.pending.remove(id);
        }
        due.into_iter().map(|(_, id)| id).collect()
    }

    /// Number of timers scheduled but not yet fired or cancelled
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether `id` is still pending
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.lock().pending.contains_key(&id)
    }

    /// Time elapsed since creation
    pub fn now(&self) -> Duration {
        self.lock().now
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let deadline = state.now + delay;
        state.pending.insert(id, deadline);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.lock().pending.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let clock = ManualScheduler::new();
        let mut scheduler = clock.clone();
        let late = scheduler.schedule(Duration::from_secs(30));
        let early = scheduler.schedule(Duration::from_secs(3));

        assert_eq!(clock.advance(Duration::from_secs(60)), vec![early, late]);
        assert_eq!(clock.pending_count(), 0);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let clock = ManualScheduler::new();
        let mut scheduler = clock.clone();
        let id = scheduler.schedule(Duration::from_millis(3000));
        scheduler.cancel(id);

        assert!(!clock.is_pending(id));
        assert!(clock.advance(Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn test_cancel_unknown_is_noop() {
        let mut scheduler = ManualScheduler::new();
        scheduler.cancel(TimerId(99));
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.schedule(Duration::from_secs(1));
        let b = scheduler.schedule(Duration::from_secs(1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_now_accumulates() {
        let clock = ManualScheduler::new();
        clock.advance(Duration::from_secs(1));
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), Duration::from_millis(1500));
    }
}
