//! Per-entity expiry timers.
//!
//! A [`Reaper`] is a cancellable handle to a task that runs an eviction
//! callback once its delay elapses. It is owned by the entity record it
//! evicts; dropping the record aborts the task, so no timer outlives its
//! entity.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A pending expiry timer.
#[derive(Debug)]
pub(crate) struct Reaper {
    /// Matches the record's generation while this timer is current.
    generation: u64,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Schedule `on_fire` to run after `delay`.
    pub(crate) fn spawn<F>(runtime: &Handle, delay: Duration, generation: u64, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        });

        Self { generation, handle }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Check whether the timer task has finished or been aborted.
    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&fired);
        (fired, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_fires_after_delay() {
        let (fired, on_fire) = counter();
        let reaper = Reaper::spawn(&Handle::current(), Duration::from_millis(1000), 3, on_fire);
        assert_eq!(reaper.generation(), 3);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(reaper.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_drop_cancels() {
        let (fired, on_fire) = counter();
        let reaper = Reaper::spawn(&Handle::current(), Duration::from_millis(1000), 0, on_fire);

        tokio::time::sleep(Duration::from_millis(500)).await;
        drop(reaper);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
