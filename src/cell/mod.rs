//! The deferred-result cell.
//!
//! A [`Flow`] is a cheaply clonable handle to a value that will be
//! computed elsewhere. It has exactly two representations:
//!
//! - **deferred**: a single-assignment slot guarded by a mutex, with a
//!   condition variable for blocking readers and a listener stack drained
//!   on completion ([`deferred::DeferredCore`]);
//! - **settled**: an immutable, already-resolved value that short-circuits
//!   composition ([`settled::SettledCore`]).
//!
//! # Completion semantics
//!
//! ```text
//! complete(outcome):
//!   lock state
//!   if already completed: unlock, return        // first write wins
//!   store outcome; snapshot listeners; clear list
//!   broadcast condvar                           // wake all waiters
//!   unlock
//!   invoke snapshot listeners outside the lock, in registration order
//! ```
//!
//! Listeners registered after completion run inline on the registering
//! thread. A listener that panics is reported to the cell's error
//! observer and never aborts the notification loop.
//!
//! # Hazards
//!
//! Listeners run on the completing thread. A long-running listener delays
//! its siblings on the same cell (never other cells, since the lock is
//! released first). A listener that blocks on a cell whose completion in
//! turn waits on this one deadlocks; the core does not detect this.

pub mod builder;
pub mod deferred;
pub mod settled;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::scheduler::Scheduler;
use crate::types::Outcome;

use deferred::DeferredCore;
use settled::SettledCore;

pub use builder::FlowBuilder;

/// A callback fired exactly once when a cell completes.
pub(crate) type Listener<T> = Box<dyn FnOnce(&Flow<T>) + Send>;

/// A handle to a value that will be computed elsewhere.
///
/// Clones share the same underlying cell; completing through one clone is
/// observed by all of them.
pub struct Flow<T> {
    repr: Repr<T>,
}

enum Repr<T> {
    Deferred(Arc<DeferredCore<T>>),
    Settled(Arc<SettledCore<T>>),
}

impl<T> Clone for Flow<T> {
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Deferred(core) => Repr::Deferred(Arc::clone(core)),
            Repr::Settled(core) => Repr::Settled(Arc::clone(core)),
        };
        Self { repr }
    }
}

impl<T: Send + Sync + 'static> Flow<T> {
    /// Creates an empty deferred cell with the given lifetime budget.
    ///
    /// A timeout of zero creates the cell already expired: completion is
    /// still possible, but [`wait`](Self::wait) raises immediately unless
    /// completion has already happened. Use [`FlowBuilder`] to inject a
    /// clock or error observer.
    #[must_use]
    pub fn deferred(timeout: Duration) -> Self {
        Self::deferred_in(timeout, Arc::new(Context::default()))
    }

    pub(crate) fn deferred_in(timeout: Duration, context: Arc<Context>) -> Self {
        Self {
            repr: Repr::Deferred(Arc::new(DeferredCore::new(timeout, context))),
        }
    }

    /// Creates a cell that is already resolved to `outcome`.
    ///
    /// The result has a zero timeout, reports [`is_expired`](Self::is_expired)
    /// as true, and invokes listeners inline at registration. Aggregators
    /// use it as their identity element.
    #[must_use]
    pub fn completed(outcome: Outcome<T>) -> Self {
        Self::completed_in(outcome, Arc::new(Context::default()))
    }

    pub(crate) fn completed_in(outcome: Outcome<T>, context: Arc<Context>) -> Self {
        Self {
            repr: Repr::Settled(Arc::new(SettledCore::new(Arc::new(outcome), context))),
        }
    }

    /// Submits `body` to the scheduler and returns the cell it will
    /// complete.
    ///
    /// The thunk completes the cell with `Success` when the body returns
    /// `Ok`, with the returned error as a failure when it returns `Err`,
    /// and with a captured [`ErrorKind::Panicked`](crate::ErrorKind::Panicked)
    /// failure when it panics.
    pub fn submit<S, F>(scheduler: &S, timeout: Duration, body: F) -> Self
    where
        S: Scheduler + ?Sized,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Self::submit_in(scheduler, timeout, Arc::new(Context::default()), body)
    }

    pub(crate) fn submit_in<S, F>(
        scheduler: &S,
        timeout: Duration,
        context: Arc<Context>,
        body: F,
    ) -> Self
    where
        S: Scheduler + ?Sized,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let flow = Self::deferred_in(timeout, context);
        let cell = flow.clone();
        scheduler.submit(Box::new(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(body)) {
                Ok(Ok(value)) => Outcome::Success(value),
                Ok(Err(error)) => Outcome::Failure(error),
                Err(payload) => Outcome::Failure(Error::panicked(payload.as_ref())),
            };
            cell.complete(outcome);
        }));
        flow
    }

    /// Completes the cell with `outcome`.
    ///
    /// The first completion wins; later calls are no-ops. Listeners
    /// registered before this call are invoked on the calling thread,
    /// outside the cell lock, in registration order.
    pub fn complete(&self, outcome: Outcome<T>) -> &Self {
        self.complete_shared(Arc::new(outcome))
    }

    pub(crate) fn complete_shared(&self, outcome: Arc<Outcome<T>>) -> &Self {
        if let Repr::Deferred(core) = &self.repr {
            core.try_complete(self, outcome);
        }
        self
    }

    /// Completes this cell with whatever `other` resolves to.
    ///
    /// No-op if this cell is already completed by the time `other`
    /// resolves.
    pub fn complete_with(&self, other: &Self) -> &Self {
        if self.is_completed() {
            return self;
        }
        let target = self.clone();
        other.on_complete(move |done| {
            target.complete_shared(done.value().expect("completed cell has an outcome"));
        });
        self
    }

    /// Returns the outcome if the cell has completed.
    #[must_use]
    pub fn value(&self) -> Option<Arc<Outcome<T>>> {
        match &self.repr {
            Repr::Deferred(core) => core.outcome(),
            Repr::Settled(core) => Some(core.outcome()),
        }
    }

    /// Returns true if the cell has completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        match &self.repr {
            Repr::Deferred(core) => core.is_completed(),
            Repr::Settled(_) => true,
        }
    }

    /// Returns true if the cell's deadline has passed.
    ///
    /// Purely a clock comparison: an expired cell can still be completed,
    /// and listeners registered afterwards still fire.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match &self.repr {
            Repr::Deferred(core) => core.is_expired(),
            Repr::Settled(_) => true,
        }
    }

    /// Returns the remaining lifetime budget, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        match &self.repr {
            Repr::Deferred(core) => core.remaining(),
            Repr::Settled(_) => Duration::ZERO,
        }
    }

    /// Blocks until the cell completes or its deadline passes.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Timeout`](crate::ErrorKind::Timeout) if the
    /// deadline passes first. The timeout is raised to this caller only;
    /// it is never stored in the cell.
    pub fn wait(&self) -> Result<&Self> {
        match &self.repr {
            Repr::Deferred(core) => {
                if core.wait_until(core.deadline()) {
                    Ok(self)
                } else {
                    Err(Error::timeout().with_context("cell deadline passed before completion"))
                }
            }
            Repr::Settled(_) => Ok(self),
        }
    }

    /// Blocks until the cell completes, ignoring the deadline.
    pub fn wait_blocking(&self) -> &Self {
        if let Repr::Deferred(core) = &self.repr {
            core.wait_done();
        }
        self
    }

    /// Blocks until the deadline and returns the outcome option.
    ///
    /// `None` means the wait timed out.
    #[must_use]
    pub fn wait_value(&self) -> Option<Arc<Outcome<T>>> {
        match &self.repr {
            Repr::Deferred(core) => {
                core.wait_until(core.deadline());
                core.outcome()
            }
            Repr::Settled(core) => Some(core.outcome()),
        }
    }

    /// Waits at most `min(duration, remaining)` and returns the outcome
    /// option.
    #[must_use]
    pub fn value_within(&self, duration: Duration) -> Option<Arc<Outcome<T>>> {
        match &self.repr {
            Repr::Deferred(core) => {
                let now = core.clock_now();
                let capped = now.saturating_add_duration(duration).min(core.deadline());
                core.wait_until(capped);
                core.outcome()
            }
            Repr::Settled(core) => Some(core.outcome()),
        }
    }

    /// Registers a callback fired exactly once when the cell completes.
    ///
    /// Registered before completion, the listener runs on whichever
    /// thread completes the cell; registered after, it runs inline on the
    /// calling thread. The listener receives the completed cell, so
    /// `value()` inside it is guaranteed `Some`. Keep listeners short:
    /// they delay sibling listeners on the same cell.
    pub fn on_complete<F>(&self, listener: F)
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        match &self.repr {
            Repr::Deferred(core) => core.register(self, Box::new(listener)),
            Repr::Settled(core) => {
                let context = core.context().clone();
                invoke_listener(self, Box::new(listener), &context);
            }
        }
    }

    pub(crate) fn context(&self) -> &Arc<Context> {
        match &self.repr {
            Repr::Deferred(core) => core.context(),
            Repr::Settled(core) => core.context(),
        }
    }

    /// True if both handles point at the same underlying cell.
    pub(crate) fn same_cell(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Deferred(a), Repr::Deferred(b)) => Arc::ptr_eq(a, b),
            (Repr::Settled(a), Repr::Settled(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Runs one listener, trapping panics into the error channel.
pub(crate) fn invoke_listener<T>(flow: &Flow<T>, listener: Listener<T>, context: &Context) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(flow))) {
        let error = Error::panicked(payload.as_ref());
        context
            .observer()
            .report(&error, "listener", "listener panicked; notification continues");
    }
}

impl<T> std::fmt::Debug for Flow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.repr {
            Repr::Deferred(core) => f
                .debug_struct("Flow")
                .field(
                    "state",
                    &if core.is_completed() {
                        "completed"
                    } else {
                        "pending"
                    },
                )
                .field("deadline", &core.deadline())
                .finish(),
            Repr::Settled(_) => f.debug_struct("Flow").field("state", &"settled").finish(),
        }
    }
}
