//! Periodic refresh timer and refresh-config follower
//!
//! Both are scoped resources: the background task lives exactly as long as
//! the handle. Dropping or stopping the handle aborts the task.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Handle to a running periodic timer
#[derive(Debug)]
pub struct RefreshTimer {
    handle: JoinHandle<()>,
    interval: Duration,
}

impl RefreshTimer {
    /// Spawn a timer that calls `on_tick` every `interval`
    ///
    /// The first tick fires one full interval after spawning. `on_tick`
    /// returns `false` to end the timer from inside the task.
    pub fn spawn<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if !on_tick() {
                    tracing::debug!("Refresh timer target is gone, exiting");
                    break;
                }
            }
        });

        Self { handle, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the timer. In-flight refreshes it already started keep running.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Keeps an orchestrator's timer in sync with a [`loglens_core::snapshot::RefreshConfigSource`]
#[derive(Debug)]
pub struct RefreshConfigWatcher {
    handle: JoinHandle<()>,
}

impl RefreshConfigWatcher {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for RefreshConfigWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_timer(interval_ms: u64) -> (RefreshTimer, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let timer = RefreshTimer::spawn(Duration::from_millis(interval_ms), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        (timer, ticks)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_interval() {
        let (_timer, ticks) = counting_timer(1000);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_periodically() {
        let (timer, ticks) = counting_timer(1000);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(timer.interval(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticking() {
        let (timer, ticks) = counting_timer(1000);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(timer);
        tokio::time::sleep(Duration::from_millis(5000)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_returning_false_ends_timer() {
        let timer = RefreshTimer::spawn(Duration::from_millis(100), || false);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(timer.is_finished());
    }
}
