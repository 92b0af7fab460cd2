//! Lightweight actor substrate.
//!
//! An actor is an object plus a [`Mailbox`]. All calls into the object are
//! enqueued as messages; the mailbox drains them one at a time on the shared
//! scheduler, so the object is never touched by two threads at once and no
//! lock is held across I/O.
//!
//! # Guarantees
//!
//! 1. Messages to one actor execute strictly in push order (modulo
//!    [`DuplicationStrategy::ReplaceNewest`], which replaces in place).
//! 2. At most one message per actor runs at any time, regardless of how many
//!    worker threads the scheduler has.
//! 3. Pushing never blocks on message execution.
//! 4. A message whose target has been dropped is a silent no-op.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tilestream::actor::{Actor, Mailbox};
//! use tilestream::scheduler::ManualScheduler;
//!
//! let scheduler = Arc::new(ManualScheduler::new());
//! let actor = Actor::new(Mailbox::new(scheduler.clone()), 0_i64);
//!
//! actor.message("add", |value| *value += 5);
//! let mut doubled = actor.converse("double", |value| *value * 2);
//!
//! scheduler.drain();
//! assert_eq!(doubled.try_recv().unwrap(), 10);
//! ```

mod handle;
mod mailbox;

pub use handle::{Actor, WeakActor};
pub use mailbox::{DuplicationStrategy, Mailbox, MailboxMessage};
