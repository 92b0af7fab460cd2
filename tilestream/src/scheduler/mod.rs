//! Task scheduling abstraction.
//!
//! Every piece of work in the tile streaming core runs as a task on a shared
//! [`Scheduler`]. Two kinds of work exist:
//!
//! - **Short tasks** ([`ScheduledTask`]): synchronous closures, optionally
//!   delayed. Mailbox drains and retry timers are short tasks.
//! - **Futures**: asynchronous work such as tile loads. These are the only
//!   operations expected to take non-trivial wall-clock time.
//!
//! # Implementations
//!
//! - [`TokioScheduler`]: production scheduler backed by a multi-threaded Tokio
//!   runtime. Several tasks may run concurrently on different worker threads.
//! - [`ManualScheduler`]: deterministic single-threaded scheduler with a
//!   simulated clock. Tasks only run when the owner calls [`ManualScheduler::drain`]
//!   or one of its variants.
//!
//! # Time
//!
//! Schedulers also own the notion of "now". Backoff bookkeeping asks the
//! scheduler for the current instant so that simulated time in tests and
//! wall-clock time in production follow the same code path.

mod manual;
mod runtime;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// A boxed, sendable unit of synchronous work.
pub type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// A boxed, sendable future with no output.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

// =============================================================================
// Scheduled Task
// =============================================================================

/// A short synchronous task with an optional start delay.
pub struct ScheduledTask {
    name: Cow<'static, str>,
    delay: Duration,
    run: TaskFn,
}

impl ScheduledTask {
    /// Creates a task that runs as soon as a worker is available.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::delayed(name, Duration::ZERO, run)
    }

    /// Creates a task that runs no earlier than `delay` from now.
    pub fn delayed<F>(name: impl Into<Cow<'static, str>>, delay: Duration, run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            name: name.into(),
            delay,
            run: Box::new(run),
        }
    }

    /// Returns the task name (used for logging).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the start delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Consumes the task and executes it on the current thread.
    pub fn run(self) {
        (self.run)()
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Scheduler Trait
// =============================================================================

/// Executes short tasks and futures on behalf of actors and tile sources.
///
/// Implementations must never run a task on the caller's stack: `add_task`
/// and `spawn` only enqueue work. This is what lets a mailbox push from inside
/// a running message without re-entering itself.
pub trait Scheduler: Send + Sync + 'static {
    /// Enqueues a short task, honouring its delay.
    fn add_task(&self, task: ScheduledTask);

    /// Spawns a future. The name is only used for diagnostics.
    fn spawn(&self, name: &'static str, future: BoxFuture);

    /// Returns the scheduler's current instant.
    fn now(&self) -> Instant;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_task_runs_closure() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let task = ScheduledTask::new("count", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(task.name(), "count");
        assert_eq!(task.delay(), Duration::ZERO);
        task.run();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delayed_task_keeps_delay() {
        let task = ScheduledTask::delayed("later", Duration::from_millis(250), || {});
        assert_eq!(task.delay(), Duration::from_millis(250));
        assert!(format!("{:?}", task).contains("later"));
    }
}
