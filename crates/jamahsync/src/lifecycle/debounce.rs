//! Cancellable delayed tasks.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs a task after a delay. Arming again cancels the pending task first,
/// so only the most recent trigger fires.
///
/// Each arm gets a generation number handed to the task. A task that only
/// posts a message can carry it, and the receiver drops messages whose
/// generation is no longer [`current`](Self::is_current). This covers a
/// message already queued when the timer was cancelled.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    /// Schedules the task built by `task` to run once the delay elapses.
    /// Returns the generation passed to it.
    pub fn arm<T, F>(&mut self, task: T) -> u64
    where
        T: FnOnce(u64) -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        let task = task(generation);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
        generation
    }

    /// Cancels the pending task and retires its generation. Returns true if
    /// the task was still waiting.
    pub fn cancel(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        match self.pending.take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// Whether `generation` belongs to the latest arm and was not cancelled.
    pub fn is_current(&self, generation: u64) -> bool {
        self.pending.is_some() && self.generation == generation
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.arm(|_| counting(&fired));
        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_keeps_only_latest() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_secs(1));

        for _ in 0..5 {
            debouncer.arm(|_| counting(&fired));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.arm(|_| counting(&fired));
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let mut debouncer = Debouncer::new(Duration::from_millis(300));
            debouncer.arm(|_| counting(&fired));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generations() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        let first = debouncer.arm(|_| counting(&fired));
        assert!(debouncer.is_current(first));

        let second = debouncer.arm(|_| counting(&fired));
        assert_ne!(first, second);
        assert!(!debouncer.is_current(first));
        assert!(debouncer.is_current(second));

        // A fired timer stays current until cancelled.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(debouncer.is_current(second));

        debouncer.cancel();
        assert!(!debouncer.is_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_retires_queued_message() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.arm(|generation| async move {
            let _ = tx.send(generation).await;
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        debouncer.cancel();

        // The message was already queued, but its generation is retired.
        let generation = rx.recv().await.unwrap();
        assert!(!debouncer.is_current(generation));
    }
}
