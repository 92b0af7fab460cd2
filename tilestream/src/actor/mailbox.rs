//! Serialized per-object message queue.
//!
//! # Drain handoff
//!
//! ```text
//! push(msg) ──► queue was empty? ──yes──► scheduler.add_task(drain)
//!                     │
//!                     no ──► a drain is already owed, nothing to do
//!
//! drain task ──► receive():
//!                  lock receiving
//!                  pop front, note whether more remain
//!                  run message
//!                  more remained? ──► scheduler.add_task(drain)
//! ```
//!
//! Every queued message is matched by exactly one drain task, so messages run
//! in push order. The `receiving` lock keeps a second drain (scheduled by a
//! push that raced with a running message) from overlapping the first on
//! another worker thread.
//!
//! Drain tasks hold only a weak reference to the mailbox; once the mailbox is
//! dropped, outstanding drains become no-ops.

use crate::scheduler::{ScheduledTask, Scheduler};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::trace;

/// How a pushed message interacts with messages already queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicationStrategy {
    /// Always append.
    #[default]
    None,

    /// Replace a queued, not-yet-executed message with the same identifier
    /// in place (keeping its queue position). Appends if none is queued.
    ReplaceNewest,
}

/// A unit of work bound to a receiver and a method.
pub struct MailboxMessage {
    identifier: &'static str,
    strategy: DuplicationStrategy,
    run: Box<dyn FnOnce() + Send + 'static>,
}

impl MailboxMessage {
    /// Creates a message. `identifier` names the target method and is what
    /// [`DuplicationStrategy::ReplaceNewest`] matches on.
    pub fn new<F>(identifier: &'static str, strategy: DuplicationStrategy, run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            identifier,
            strategy,
            run: Box::new(run),
        }
    }

    /// Returns the target identifier.
    pub fn identifier(&self) -> &'static str {
        self.identifier
    }

    /// Returns the duplication strategy.
    pub fn strategy(&self) -> DuplicationStrategy {
        self.strategy
    }
}

impl fmt::Debug for MailboxMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxMessage")
            .field("identifier", &self.identifier)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Single-consumer, multi-producer FIFO bound to a scheduler.
pub struct Mailbox {
    scheduler: Arc<dyn Scheduler>,
    queue: Mutex<VecDeque<MailboxMessage>>,
    receiving: Mutex<()>,
}

impl Mailbox {
    /// Creates a mailbox draining on `scheduler`.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            queue: Mutex::new(VecDeque::new()),
            receiving: Mutex::new(()),
        })
    }

    /// Returns the scheduler this mailbox drains on.
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Number of messages waiting to run.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if no message is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Appends (or replaces, see [`DuplicationStrategy`]) a message.
    ///
    /// Never blocks on message execution.
    pub fn push(self: &Arc<Self>, message: MailboxMessage) {
        let was_empty = {
            let mut queue = self.queue.lock();
            let was_empty = queue.is_empty();

            let identifier = message.identifier;
            let slot = match message.strategy {
                DuplicationStrategy::ReplaceNewest => queue.iter_mut().find(|queued| {
                    queued.identifier == identifier
                        && queued.strategy == DuplicationStrategy::ReplaceNewest
                }),
                DuplicationStrategy::None => None,
            };
            match slot {
                Some(slot) => {
                    trace!(identifier, "Replacing queued message");
                    *slot = message;
                }
                None => queue.push_back(message),
            }

            was_empty
        };

        if was_empty {
            self.schedule_drain();
        }
    }

    /// Pops and runs exactly one message. Called from drain tasks only.
    fn receive(self: &Arc<Self>) {
        let _receiving = self.receiving.lock();

        let (message, more_remaining) = {
            let mut queue = self.queue.lock();
            let message = queue.pop_front();
            (message, !queue.is_empty())
        };

        if let Some(message) = message {
            trace!(identifier = message.identifier, "Executing message");
            (message.run)();
        }

        if more_remaining {
            self.schedule_drain();
        }
    }

    fn schedule_drain(self: &Arc<Self>) {
        let mailbox: Weak<Self> = Arc::downgrade(self);
        self.scheduler
            .add_task(ScheduledTask::new("mailbox_drain", move || {
                if let Some(mailbox) = mailbox.upgrade() {
                    mailbox.receive();
                }
            }));
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("queued", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    fn setup() -> (Arc<ManualScheduler>, Arc<Mailbox>, Arc<Mutex<Vec<i32>>>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let mailbox = Mailbox::new(scheduler.clone());
        (scheduler, mailbox, Arc::new(Mutex::new(Vec::new())))
    }

    fn record(
        log: &Arc<Mutex<Vec<i32>>>,
        id: &'static str,
        strategy: DuplicationStrategy,
        value: i32,
    ) -> MailboxMessage {
        let log = Arc::clone(log);
        MailboxMessage::new(id, strategy, move || log.lock().push(value))
    }

    #[test]
    fn test_push_schedules_single_drain() {
        let (scheduler, mailbox, log) = setup();
        mailbox.push(record(&log, "a", DuplicationStrategy::None, 1));
        mailbox.push(record(&log, "a", DuplicationStrategy::None, 2));
        mailbox.push(record(&log, "a", DuplicationStrategy::None, 3));

        assert_eq!(scheduler.ready_tasks(), 1);
        assert_eq!(mailbox.len(), 3);

        scheduler.drain();
        assert_eq!(*log.lock(), vec![1, 2, 3]);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_replace_newest_keeps_position() {
        let (scheduler, mailbox, log) = setup();
        mailbox.push(record(&log, "bounds", DuplicationStrategy::ReplaceNewest, 5));
        mailbox.push(record(&log, "other", DuplicationStrategy::None, 1));
        mailbox.push(record(&log, "bounds", DuplicationStrategy::ReplaceNewest, 9));

        assert_eq!(mailbox.len(), 2);
        scheduler.drain();
        assert_eq!(*log.lock(), vec![9, 1]);
    }

    #[test]
    fn test_replace_does_not_touch_plain_messages() {
        let (scheduler, mailbox, log) = setup();
        mailbox.push(record(&log, "bounds", DuplicationStrategy::None, 1));
        mailbox.push(record(&log, "bounds", DuplicationStrategy::ReplaceNewest, 2));

        scheduler.drain();
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn test_dropped_mailbox_makes_drain_noop() {
        let (scheduler, mailbox, log) = setup();
        mailbox.push(record(&log, "a", DuplicationStrategy::None, 1));
        drop(mailbox);

        scheduler.drain();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_push_from_running_message() {
        let (scheduler, mailbox, log) = setup();
        let inner_mailbox = Arc::clone(&mailbox);
        let inner_log = Arc::clone(&log);
        mailbox.push(MailboxMessage::new("outer", DuplicationStrategy::None, move || {
            inner_log.lock().push(1);
            inner_mailbox.push(record(&inner_log, "inner", DuplicationStrategy::None, 2));
        }));
        mailbox.push(record(&log, "after", DuplicationStrategy::None, 3));

        scheduler.drain();
        assert_eq!(*log.lock(), vec![1, 3, 2]);
    }
}
