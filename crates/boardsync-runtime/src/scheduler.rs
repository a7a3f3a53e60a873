//! Tokio-backed task scheduler
//!
//! Each timer is a spawned task that sleeps and then reports its handle on
//! a channel the driver selects on. Cancelling aborts the task, so a
//! cancelled timer never reports.

use std::collections::HashMap;
use std::time::Duration;

use boardsync_core::{TaskHandle, TaskScheduler, TimerKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Receiving half of the fired-timer channel
pub type FiredTimerReceiver = mpsc::UnboundedReceiver<TaskHandle>;

pub struct TokioScheduler {
    fired: mpsc::UnboundedSender<TaskHandle>,
    tasks: HashMap<TaskHandle, JoinHandle<()>>,
    next_id: u64,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver its timers report on
    pub fn new() -> (Self, FiredTimerReceiver) {
        let (fired, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            fired,
            tasks: HashMap::new(),
            next_id: 0,
        };
        (scheduler, receiver)
    }

    /// Number of timers not yet fired or cancelled
    pub fn active_count(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}

impl TaskScheduler for TokioScheduler {
    fn start(&mut self, kind: TimerKind, delay: Duration) -> TaskHandle {
        self.tasks.retain(|_, task| !task.is_finished());
        self.next_id += 1;
        let handle = TaskHandle(self.next_id);
        let fired = self.fired.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(?handle, ?kind, "Timer fired");
            // The driver may already be gone during shutdown
            let _ = fired.send(handle);
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        let handle = scheduler.start(TimerKind::RewindLock, Duration::from_millis(750));

        tokio::time::advance(Duration::from_millis(749)).await;
        assert!(fired.try_recv().is_err());

        assert_eq!(fired.recv().await, Some(handle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        let cancelled = scheduler.start(TimerKind::NavigationRepeat, Duration::from_millis(10));
        let kept = scheduler.start(TimerKind::NavigationRepeat, Duration::from_millis(20));
        scheduler.cancel(cancelled);

        assert_eq!(fired.recv().await, Some(kept));
        assert_eq!(scheduler.active_count(), 0);
    }
}
