//! The mutable single-assignment representation.
//!
//! State transitions happen under one `parking_lot::Mutex`:
//!
//! - `outcome` moves from `None` to `Some` exactly once; the writer
//!   snapshots and clears the listener stack in the same critical
//!   section, so invariant "completed implies no stored listeners" holds
//!   at every lock release.
//! - Waiters park on the condition variable and re-derive their remaining
//!   budget from the clock on every wakeup, which makes the wait loop
//!   robust to spurious wakeups.
//!
//! The deadline is fixed at construction: `created_at + timeout`,
//! saturating, so an "effectively unbounded" timeout parks waiters on
//! `Time::MAX`.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::context::Context;
use crate::types::time::Time;
use crate::types::Outcome;

use super::{invoke_listener, Flow, Listener};

pub(crate) struct DeferredCore<T> {
    state: Mutex<CellState<T>>,
    condvar: Condvar,
    deadline: Time,
    context: Arc<Context>,
}

struct CellState<T> {
    outcome: Option<Arc<Outcome<T>>>,
    listeners: Vec<Listener<T>>,
}

impl<T> DeferredCore<T> {
    pub(crate) fn new(timeout: Duration, context: Arc<Context>) -> Self {
        let created_at = context.clock().now();
        Self {
            state: Mutex::new(CellState {
                outcome: None,
                listeners: Vec::new(),
            }),
            condvar: Condvar::new(),
            deadline: created_at.saturating_add_duration(timeout),
            context,
        }
    }

    /// First completion wins; the winning thread drains and notifies.
    pub(crate) fn try_complete(&self, flow: &Flow<T>, outcome: Arc<Outcome<T>>) {
        let drained = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                return;
            }
            state.outcome = Some(outcome);
            self.condvar.notify_all();
            mem::take(&mut state.listeners)
        };
        // Outside the lock: a listener may re-enter this or another cell.
        for listener in drained {
            invoke_listener(flow, listener, &self.context);
        }
    }

    /// Stores the listener, or hands it back for inline invocation when
    /// the cell is already completed.
    pub(crate) fn register(&self, flow: &Flow<T>, listener: Listener<T>) {
        let immediate = {
            let mut state = self.state.lock();
            if state.outcome.is_none() {
                state.listeners.push(listener);
                None
            } else {
                Some(listener)
            }
        };
        if let Some(listener) = immediate {
            invoke_listener(flow, listener, &self.context);
        }
    }

    /// Parks until completion or `deadline`, whichever comes first.
    ///
    /// Returns true if the cell completed.
    pub(crate) fn wait_until(&self, deadline: Time) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.outcome.is_some() {
                return true;
            }
            let now = self.context.clock().now();
            if now >= deadline {
                return false;
            }
            let remaining = Duration::from_nanos(deadline.duration_since(now));
            // Spurious wakeups and timed-out waits both fall through to the
            // re-check above; the clock is the only authority on expiry.
            let _ = self.condvar.wait_for(&mut state, remaining);
        }
    }

    /// Parks until completion, with no deadline.
    pub(crate) fn wait_done(&self) {
        let mut state = self.state.lock();
        while state.outcome.is_none() {
            self.condvar.wait(&mut state);
        }
    }

    pub(crate) fn outcome(&self) -> Option<Arc<Outcome<T>>> {
        self.state.lock().outcome.clone()
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.state.lock().outcome.is_some()
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.context.clock().now() >= self.deadline
    }

    pub(crate) fn remaining(&self) -> Duration {
        let now = self.context.clock().now();
        Duration::from_nanos(self.deadline.duration_since(now))
    }

    pub(crate) fn deadline(&self) -> Time {
        self.deadline
    }

    pub(crate) fn clock_now(&self) -> Time {
        self.context.clock().now()
    }

    pub(crate) fn context(&self) -> &Arc<Context> {
        &self.context
    }
}
