//! Deterministic scheduler with a simulated clock.
//!
//! Nothing runs until the owner drives the scheduler. Delayed tasks are kept
//! in a min-heap keyed by their due time on the simulated clock; futures are
//! polled with a no-op waker and re-polled on every drain pass until they
//! complete.
//!
//! ```text
//! drain():
//!   loop {
//!     run one ready task            ──► progress? continue
//!     poll every pending future     ──► one completed? continue
//!     run earliest delayed task     ──► clock jumps to its due time
//!     otherwise stop
//!   }
//! ```
//!
//! Futures driven here must not depend on a Tokio runtime context (timers,
//! `yield_now`). Channel-based futures such as `tokio::sync::oneshot` work
//! because they are re-polled on every pass.

use super::{BoxFuture, ScheduledTask, Scheduler};
use futures::task::noop_waker_ref;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

struct DelayedEntry {
    due: Duration,
    sequence: u64,
    task: ScheduledTask,
}

// Min-heap ordering: earliest due first, then insertion order.
impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

impl Eq for DelayedEntry {}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct PendingFuture {
    name: &'static str,
    future: BoxFuture,
}

struct ManualInner {
    ready: VecDeque<ScheduledTask>,
    delayed: BinaryHeap<DelayedEntry>,
    futures: Vec<PendingFuture>,
    elapsed: Duration,
    sequence: u64,
}

/// Single-threaded scheduler for deterministic tests and simulations.
pub struct ManualScheduler {
    origin: Instant,
    inner: Mutex<ManualInner>,
}

impl ManualScheduler {
    /// Creates a scheduler whose simulated clock starts at zero.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            inner: Mutex::new(ManualInner {
                ready: VecDeque::new(),
                delayed: BinaryHeap::new(),
                futures: Vec::new(),
                elapsed: Duration::ZERO,
                sequence: 0,
            }),
        }
    }

    /// Simulated time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.inner.lock().elapsed
    }

    /// Number of tasks ready to run right now.
    pub fn ready_tasks(&self) -> usize {
        self.inner.lock().ready.len()
    }

    /// Number of delayed tasks that have not yet run.
    pub fn delayed_tasks(&self) -> usize {
        self.inner.lock().delayed.len()
    }

    /// Number of spawned futures that have not completed.
    pub fn pending_futures(&self) -> usize {
        self.inner.lock().futures.len()
    }

    /// Due time of the earliest delayed task, if any.
    pub fn next_delayed_due(&self) -> Option<Duration> {
        self.inner.lock().delayed.peek().map(|entry| entry.due)
    }

    /// Runs everything, including delayed tasks, until no work is left.
    ///
    /// The simulated clock jumps forward to each delayed task's due time as
    /// it runs.
    pub fn drain(&self) {
        self.drain_bounded(None);
    }

    /// Advances the clock to `until` (never backwards) and runs everything
    /// that is due by then.
    pub fn drain_until(&self, until: Duration) {
        {
            let mut inner = self.inner.lock();
            if until > inner.elapsed {
                inner.elapsed = until;
            }
        }
        self.drain_bounded(Some(until));
    }

    /// Advances the clock by `step` and runs everything due.
    pub fn advance(&self, step: Duration) {
        let until = self.elapsed() + step;
        self.drain_until(until);
    }

    /// Runs ready work, then advances to the next delayed task and runs it.
    ///
    /// Returns `false` if there was no delayed task to step to.
    pub fn step_until_next_delayed(&self) -> bool {
        self.drain_bounded(Some(self.elapsed()));
        match self.next_delayed_due() {
            Some(due) => {
                self.drain_until(due);
                true
            }
            None => false,
        }
    }

    fn drain_bounded(&self, until: Option<Duration>) {
        loop {
            if self.run_one_ready() {
                continue;
            }
            if self.poll_futures() {
                continue;
            }
            if self.run_one_delayed(until) {
                continue;
            }
            break;
        }
    }

    fn run_one_ready(&self) -> bool {
        let task = self.inner.lock().ready.pop_front();
        match task {
            Some(task) => {
                tracing::trace!(task = task.name(), "Running task");
                task.run();
                true
            }
            None => false,
        }
    }

    fn run_one_delayed(&self, until: Option<Duration>) -> bool {
        let task = {
            let mut inner = self.inner.lock();
            let due = match inner.delayed.peek() {
                Some(entry) => entry.due,
                None => return false,
            };
            if until.is_some_and(|limit| due > limit) {
                return false;
            }
            if due > inner.elapsed {
                inner.elapsed = due;
            }
            inner.delayed.pop().map(|entry| entry.task)
        };
        match task {
            Some(task) => {
                tracing::trace!(task = task.name(), "Running delayed task");
                task.run();
                true
            }
            None => false,
        }
    }

    /// Polls every pending future once. Returns true if any completed.
    fn poll_futures(&self) -> bool {
        let pending = std::mem::take(&mut self.inner.lock().futures);
        if pending.is_empty() {
            return false;
        }

        let mut cx = Context::from_waker(noop_waker_ref());
        let mut still_pending = Vec::with_capacity(pending.len());
        let mut completed = false;

        for mut entry in pending {
            match entry.future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => {
                    tracing::trace!(future = entry.name, "Future completed");
                    completed = true;
                }
                Poll::Pending => still_pending.push(entry),
            }
        }

        // Futures spawned while polling were pushed behind our back; keep them.
        let mut inner = self.inner.lock();
        still_pending.append(&mut inner.futures);
        inner.futures = still_pending;

        completed
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn add_task(&self, task: ScheduledTask) {
        let mut inner = self.inner.lock();
        if task.delay().is_zero() {
            inner.ready.push_back(task);
        } else {
            let due = inner.elapsed + task.delay();
            let sequence = inner.sequence;
            inner.sequence += 1;
            inner.delayed.push(DelayedEntry {
                due,
                sequence,
                task,
            });
        }
    }

    fn spawn(&self, name: &'static str, future: BoxFuture) {
        self.inner.lock().futures.push(PendingFuture { name, future });
    }

    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}
