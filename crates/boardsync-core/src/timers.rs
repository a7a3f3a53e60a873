//! Cancellable timers
//!
//! The core never sleeps. It asks a [`TaskScheduler`] to fire a timer later
//! and is handed the [`TaskHandle`] back when the timer fires. Countdowns and
//! the rewind lock are built on top of that seam.

use core::time::Duration;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Scheduler Trait
// ----------------------------------------------------------------------------

/// Identifier of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskHandle(pub u64);

/// What a timer was scheduled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerKind {
    Countdown(CountdownKind),
    RewindLock,
    NavigationRepeat,
}

/// Scoped cancellable tasks
pub trait TaskScheduler {
    /// Fire a timer of `kind` after `delay`
    fn start(&mut self, kind: TimerKind, delay: Duration) -> TaskHandle;

    /// Cancel a timer; cancelling a fired or unknown handle is a no-op
    fn cancel(&mut self, handle: TaskHandle);
}

/// Deterministic scheduler driven by explicit time advances
///
/// Used by tests and by offline replays where no async runtime is running.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_id: u64,
    pending: Vec<(TaskHandle, TimerKind, Duration)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock, returning fired timers in deadline order
    pub fn advance(&mut self, by: Duration) -> Vec<(TaskHandle, TimerKind)> {
        self.now = self.now.saturating_add(by);
        let now = self.now;
        let mut fired: Vec<(TaskHandle, TimerKind, Duration)> = Vec::new();
        self.pending.retain(|entry| {
            if entry.2 <= now {
                fired.push(*entry);
                false
            } else {
                true
            }
        });
        fired.sort_by_key(|(handle, _, deadline)| (*deadline, *handle));
        fired
            .into_iter()
            .map(|(handle, kind, _)| (handle, kind))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.pending.iter().any(|(pending, _, _)| *pending == handle)
    }
}

impl TaskScheduler for ManualScheduler {
    fn start(&mut self, kind: TimerKind, delay: Duration) -> TaskHandle {
        self.next_id += 1;
        let handle = TaskHandle(self.next_id);
        self.pending.push((handle, kind, self.now.saturating_add(delay)));
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) {
        self.pending.retain(|(pending, _, _)| *pending != handle);
    }
}

// ----------------------------------------------------------------------------
// Countdowns
// ----------------------------------------------------------------------------

/// Countdowns displayed during an online game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CountdownKind {
    /// Opponent will be auto-resigned for being AFK
    OpponentAfk,
    /// Opponent will be auto-resigned for disconnecting
    OpponentDisconnect,
    /// Server restarts for maintenance
    ServerRestart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunningCountdown {
    handle: TaskHandle,
    ends_at: Timestamp,
}

/// At most one running countdown per kind
#[derive(Debug, Default)]
pub struct Countdowns {
    running: HashMap<CountdownKind, RunningCountdown>,
}

impl Countdowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a countdown, cancelling any running one of the same kind
    pub fn start(
        &mut self,
        scheduler: &mut dyn TaskScheduler,
        kind: CountdownKind,
        millis: u64,
        now: Timestamp,
    ) {
        if let Some(previous) = self.running.remove(&kind) {
            trace!(?kind, "Replacing running countdown");
            scheduler.cancel(previous.handle);
        }
        let handle = scheduler.start(TimerKind::Countdown(kind), Duration::from_millis(millis));
        debug!(?kind, millis, "Countdown started");
        self.running.insert(
            kind,
            RunningCountdown {
                handle,
                ends_at: now + millis,
            },
        );
    }

    /// Stop a countdown, returning whether one was running
    pub fn stop(&mut self, scheduler: &mut dyn TaskScheduler, kind: CountdownKind) -> bool {
        match self.running.remove(&kind) {
            Some(running) => {
                scheduler.cancel(running.handle);
                debug!(?kind, "Countdown stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self, scheduler: &mut dyn TaskScheduler) {
        for (_, running) in self.running.drain() {
            scheduler.cancel(running.handle);
        }
    }

    /// Claim a fired timer; `None` if it was not a live countdown
    pub fn on_fired(&mut self, handle: TaskHandle) -> Option<CountdownKind> {
        let kind = self
            .running
            .iter()
            .find(|(_, running)| running.handle == handle)
            .map(|(kind, _)| *kind)?;
        self.running.remove(&kind);
        Some(kind)
    }

    pub fn is_running(&self, kind: CountdownKind) -> bool {
        self.running.contains_key(&kind)
    }

    /// Milliseconds left on a countdown
    pub fn remaining(&self, kind: CountdownKind, now: Timestamp) -> Option<u64> {
        self.running.get(&kind).map(|running| running.ends_at - now)
    }
}

// ----------------------------------------------------------------------------
// Action Lock
// ----------------------------------------------------------------------------

/// Reference-counted, self-releasing lock
///
/// Each `lock_for` holds the lock until its own timer fires; overlapping
/// holds release only when the last one expires.
#[derive(Debug, Default)]
pub struct ActionLock {
    holds: Vec<TaskHandle>,
}

impl ActionLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&mut self, scheduler: &mut dyn TaskScheduler, kind: TimerKind, duration: Duration) {
        self.holds.push(scheduler.start(kind, duration));
    }

    /// Release the hold owned by `handle`, returning whether it was ours
    pub fn on_fired(&mut self, handle: TaskHandle) -> bool {
        let before = self.holds.len();
        self.holds.retain(|held| *held != handle);
        self.holds.len() != before
    }

    pub fn is_locked(&self) -> bool {
        !self.holds.is_empty()
    }

    pub fn hold_count(&self) -> usize {
        self.holds.len()
    }

    pub fn release_all(&mut self, scheduler: &mut dyn TaskScheduler) {
        for handle in self.holds.drain(..) {
            scheduler.cancel(handle);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_scheduler_fires_in_order() {
        let mut scheduler = ManualScheduler::new();
        let late = scheduler.start(TimerKind::RewindLock, Duration::from_millis(50));
        let early = scheduler.start(TimerKind::NavigationRepeat, Duration::from_millis(10));
        let cancelled = scheduler.start(TimerKind::RewindLock, Duration::from_millis(5));
        scheduler.cancel(cancelled);

        let fired = scheduler.advance(Duration::from_millis(100));
        assert_eq!(
            fired,
            vec![
                (early, TimerKind::NavigationRepeat),
                (late, TimerKind::RewindLock)
            ]
        );
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_countdown_replacement() {
        let mut scheduler = ManualScheduler::new();
        let mut countdowns = Countdowns::new();
        let now = Timestamp::new(1_000);

        countdowns.start(&mut scheduler, CountdownKind::OpponentAfk, 20_000, now);
        countdowns.start(&mut scheduler, CountdownKind::OpponentAfk, 5_000, now);
        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(
            countdowns.remaining(CountdownKind::OpponentAfk, Timestamp::new(2_000)),
            Some(4_000)
        );

        let fired = scheduler.advance(Duration::from_millis(5_000));
        assert_eq!(fired.len(), 1);
        assert_eq!(countdowns.on_fired(fired[0].0), Some(CountdownKind::OpponentAfk));
        assert!(!countdowns.is_running(CountdownKind::OpponentAfk));
    }

    #[test]
    fn test_countdown_stop_cancels_timer() {
        let mut scheduler = ManualScheduler::new();
        let mut countdowns = Countdowns::new();
        countdowns.start(
            &mut scheduler,
            CountdownKind::ServerRestart,
            1_000,
            Timestamp::new(0),
        );

        assert!(countdowns.stop(&mut scheduler, CountdownKind::ServerRestart));
        assert!(!countdowns.stop(&mut scheduler, CountdownKind::ServerRestart));
        assert!(scheduler.advance(Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_overlapping_locks_release_at_zero() {
        let mut scheduler = ManualScheduler::new();
        let mut lock = ActionLock::new();
        lock.lock_for(&mut scheduler, TimerKind::RewindLock, Duration::from_millis(750));
        scheduler.advance(Duration::from_millis(500));
        lock.lock_for(&mut scheduler, TimerKind::RewindLock, Duration::from_millis(750));

        for (handle, _) in scheduler.advance(Duration::from_millis(250)) {
            assert!(lock.on_fired(handle));
        }
        assert!(lock.is_locked());
        assert_eq!(lock.hold_count(), 1);

        for (handle, _) in scheduler.advance(Duration::from_millis(500)) {
            lock.on_fired(handle);
        }
        assert!(!lock.is_locked());
    }
}
