//! Tokio-backed scheduler.
//!
//! Short tasks and futures are spawned onto a runtime handle. Delayed tasks
//! sleep on the runtime timer first. A shared [`CancellationToken`] stops all
//! outstanding work on shutdown: pending delays are abandoned and futures are
//! dropped at their next await point.

use super::{BoxFuture, ScheduledTask, Scheduler};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

/// Scheduler running on a (typically multi-threaded) Tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
    shutdown: CancellationToken,
}

impl TokioScheduler {
    /// Creates a scheduler spawning onto the given runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            shutdown: CancellationToken::new(),
        }
    }

    /// Creates a scheduler for the runtime the caller is running in.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Stops all pending and future work.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Scheduler shutting down");
            self.shutdown.cancel();
        }
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Scheduler for TokioScheduler {
    fn add_task(&self, task: ScheduledTask) {
        if self.shutdown.is_cancelled() {
            trace!(task = task.name(), "Dropping task after shutdown");
            return;
        }

        let token = self.shutdown.clone();
        self.handle.spawn(async move {
            let delay = task.delay();
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if token.is_cancelled() {
                return;
            }
            task.run();
        });
    }

    fn spawn(&self, name: &'static str, future: BoxFuture) {
        if self.shutdown.is_cancelled() {
            trace!(future = name, "Dropping future after shutdown");
            return;
        }

        let token = self.shutdown.clone();
        self.handle.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!(future = name, "Future cancelled by shutdown");
                }
                _ = future => {}
            }
        });
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_runs_immediate_task() {
        let scheduler = TokioScheduler::current();
        let (tx, rx) = oneshot::channel();
        scheduler.add_task(ScheduledTask::new("send", move || {
            let _ = tx.send(42);
        }));

        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_runs_delayed_task() {
        let scheduler = TokioScheduler::current();
        let (tx, rx) = oneshot::channel();
        let start = Instant::now();
        scheduler.add_task(ScheduledTask::delayed(
            "later",
            Duration::from_millis(30),
            move || {
                let _ = tx.send(());
            },
        ));

        rx.await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_spawned_future_runs() {
        let scheduler = TokioScheduler::current();
        let (tx, rx) = oneshot::channel();
        scheduler.spawn(
            "future",
            Box::pin(async move {
                let _ = tx.send("done");
            }),
        );

        assert_eq!(rx.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_shutdown_abandons_delayed_tasks() {
        let scheduler = TokioScheduler::current();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        scheduler.add_task(ScheduledTask::delayed(
            "never",
            Duration::from_millis(50),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
        ));

        scheduler.shutdown();
        assert!(scheduler.is_shutdown());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // New work after shutdown is dropped as well.
        let c = Arc::clone(&counter);
        scheduler.add_task(ScheduledTask::new("dropped", move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
