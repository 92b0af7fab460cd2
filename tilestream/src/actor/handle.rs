//! Strong and weak actor handles.

use super::mailbox::{DuplicationStrategy, Mailbox, MailboxMessage};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::debug;

/// Owning handle: an object plus the mailbox that serializes access to it.
///
/// The object lives behind a mutex that is only ever taken by the mailbox's
/// drain (uncontended) or by [`inspect`](Self::inspect) during setup.
pub struct Actor<T> {
    object: Arc<Mutex<T>>,
    mailbox: Arc<Mailbox>,
}

impl<T: Send + 'static> Actor<T> {
    /// Wraps `object` and binds it to `mailbox`.
    pub fn new(mailbox: Arc<Mailbox>, object: T) -> Self {
        Self {
            object: Arc::new(Mutex::new(object)),
            mailbox,
        }
    }

    /// Enqueues `f` to run against the object.
    pub fn message<F>(&self, identifier: &'static str, f: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.message_with(DuplicationStrategy::None, identifier, f);
    }

    /// Enqueues `f` with an explicit duplication strategy.
    pub fn message_with<F>(&self, strategy: DuplicationStrategy, identifier: &'static str, f: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        push_bound(&self.mailbox, Arc::downgrade(&self.object), strategy, identifier, f);
    }

    /// Enqueues `f` and returns a receiver for its result.
    ///
    /// The caller is never blocked. If the object is gone by the time the
    /// message runs, the sender is dropped and the receiver yields an error.
    pub fn converse<R, F>(&self, identifier: &'static str, f: F) -> oneshot::Receiver<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        converse_bound(&self.mailbox, Arc::downgrade(&self.object), identifier, f)
    }

    /// Returns a non-owning handle to the same object and mailbox.
    pub fn weak_actor(&self) -> WeakActor<T> {
        WeakActor {
            object: Arc::downgrade(&self.object),
            mailbox: Arc::clone(&self.mailbox),
        }
    }

    /// Runs `f` against the object directly, bypassing the mailbox.
    ///
    /// Only for setup before the first message and for tests. Must not be
    /// called from inside a message targeting the same actor.
    pub fn inspect<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.object.lock())
    }

    /// Returns the mailbox.
    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }
}

impl<T> fmt::Debug for Actor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("mailbox", &self.mailbox)
            .finish_non_exhaustive()
    }
}

/// Non-owning handle. Messages sent after the object is gone are dropped.
pub struct WeakActor<T> {
    object: Weak<Mutex<T>>,
    mailbox: Arc<Mailbox>,
}

impl<T: Send + 'static> WeakActor<T> {
    /// Returns true while the object is still alive.
    pub fn is_alive(&self) -> bool {
        self.object.strong_count() > 0
    }

    /// Enqueues `f` if the object is still alive.
    pub fn message<F>(&self, identifier: &'static str, f: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.message_with(DuplicationStrategy::None, identifier, f);
    }

    /// Enqueues `f` with an explicit duplication strategy.
    pub fn message_with<F>(&self, strategy: DuplicationStrategy, identifier: &'static str, f: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        if !self.is_alive() {
            debug!(identifier, "Actor target expired, dropping message");
            return;
        }
        push_bound(&self.mailbox, self.object.clone(), strategy, identifier, f);
    }

    /// Enqueues `f` and returns a receiver for its result.
    pub fn converse<R, F>(&self, identifier: &'static str, f: F) -> oneshot::Receiver<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        converse_bound(&self.mailbox, self.object.clone(), identifier, f)
    }
}

impl<T> Clone for WeakActor<T> {
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}

impl<T> fmt::Debug for WeakActor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakActor")
            .field("alive", &(self.object.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

fn push_bound<T, F>(
    mailbox: &Arc<Mailbox>,
    object: Weak<Mutex<T>>,
    strategy: DuplicationStrategy,
    identifier: &'static str,
    f: F,
) where
    T: Send + 'static,
    F: FnOnce(&mut T) + Send + 'static,
{
    mailbox.push(MailboxMessage::new(identifier, strategy, move || {
        match object.upgrade() {
            Some(object) => f(&mut object.lock()),
            None => debug!(identifier, "Actor target expired before delivery"),
        }
    }));
}

fn converse_bound<T, R, F>(
    mailbox: &Arc<Mailbox>,
    object: Weak<Mutex<T>>,
    identifier: &'static str,
    f: F,
) -> oneshot::Receiver<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut T) -> R + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    push_bound(mailbox, object, DuplicationStrategy::None, identifier, move |target| {
        // Receiver may have been dropped; the result is then unwanted.
        let _ = tx.send(f(target));
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    #[derive(Default)]
    struct Counter {
        value: i64,
    }

    impl Counter {
        fn increment(&mut self) {
            self.value += 1;
        }

        fn add(&mut self, x: i64) {
            self.value += x;
        }

        fn times2(&mut self) {
            self.value *= 2;
        }
    }

    fn counter_actor() -> (Arc<ManualScheduler>, Actor<Counter>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let mailbox = Mailbox::new(scheduler.clone());
        (scheduler, Actor::new(mailbox, Counter::default()))
    }

    #[test]
    fn test_single_message() {
        let (scheduler, actor) = counter_actor();
        actor.message("Counter::increment", Counter::increment);

        scheduler.drain();
        assert_eq!(actor.inspect(|c| c.value), 1);
    }

    #[test]
    fn test_messages_run_in_push_order() {
        let (scheduler, actor) = counter_actor();
        actor.message("Counter::increment", Counter::increment);
        actor.message("Counter::add", |c| c.add(5));
        actor.message("Counter::times2", Counter::times2);

        scheduler.drain();
        assert_eq!(actor.inspect(|c| c.value), (0 + 1 + 5) * 2);
    }

    #[test]
    fn test_replace_newest() {
        let (scheduler, actor) = counter_actor();
        actor.message_with(DuplicationStrategy::ReplaceNewest, "Counter::add", |c| c.add(5));
        actor.message_with(DuplicationStrategy::ReplaceNewest, "Counter::add", |c| c.add(3));

        scheduler.drain();
        assert_eq!(actor.inspect(|c| c.value), 3);
    }

    #[test]
    fn test_replace_newest_with_interleaved_messages() {
        let (scheduler, actor) = counter_actor();
        actor.message_with(DuplicationStrategy::ReplaceNewest, "Counter::add", |c| c.add(5));
        actor.message("Counter::increment", Counter::increment);
        actor.message("Counter::times2", Counter::times2);
        actor.message_with(DuplicationStrategy::ReplaceNewest, "Counter::add", |c| c.add(100));
        actor.message("Counter::times2", Counter::times2);
        actor.message_with(DuplicationStrategy::ReplaceNewest, "Counter::add", |c| c.add(3));

        scheduler.drain();

        let mut expected = Counter::default();
        expected.add(3);
        expected.increment();
        expected.times2();
        expected.times2();
        assert_eq!(actor.inspect(|c| c.value), expected.value);
    }

    #[test]
    fn test_weak_actor_delivers_while_alive() {
        let (scheduler, actor) = counter_actor();
        let weak = actor.weak_actor();
        assert!(weak.is_alive());

        weak.message("Counter::add", |c| c.add(5));
        scheduler.drain();
        assert_eq!(actor.inspect(|c| c.value), 5);
    }

    #[test]
    fn test_weak_actor_noop_after_drop() {
        let (scheduler, actor) = counter_actor();
        let weak = actor.weak_actor();
        drop(actor);

        assert!(!weak.is_alive());
        weak.message("Counter::add", |c| c.add(5));
        scheduler.drain();
    }

    #[test]
    fn test_queued_message_noop_when_object_dropped() {
        let (scheduler, actor) = counter_actor();
        let weak = actor.weak_actor();
        weak.message("Counter::increment", Counter::increment);
        drop(actor);

        // Drain must not panic; the message silently does nothing.
        scheduler.drain();
    }

    #[test]
    fn test_converse_returns_result() {
        let (scheduler, actor) = counter_actor();
        actor.message("Counter::add", |c| c.add(20));
        let mut rx = actor.converse("Counter::value", |c| c.value * 2);

        assert!(rx.try_recv().is_err());
        scheduler.drain();
        assert_eq!(rx.try_recv().unwrap(), 40);
    }

    #[test]
    fn test_converse_on_expired_target_errors() {
        let (scheduler, actor) = counter_actor();
        let weak = actor.weak_actor();
        drop(actor);

        let mut rx = weak.converse("Counter::value", |c| c.value);
        scheduler.drain();
        assert!(rx.try_recv().is_err());
    }
}
