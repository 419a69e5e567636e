//! The immutable, already-resolved representation.
//!
//! A settled cell carries its outcome from construction. There is nothing
//! to guard: reads return the shared outcome, waits return immediately,
//! the zero timeout makes it permanently expired, and listener
//! registration is the inline invocation path of the deferred
//! representation, unconditionally.

use std::sync::Arc;

use crate::context::Context;
use crate::types::Outcome;

pub(crate) struct SettledCore<T> {
    outcome: Arc<Outcome<T>>,
    context: Arc<Context>,
}

impl<T> SettledCore<T> {
    pub(crate) fn new(outcome: Arc<Outcome<T>>, context: Arc<Context>) -> Self {
        Self { outcome, context }
    }

    pub(crate) fn outcome(&self) -> Arc<Outcome<T>> {
        Arc::clone(&self.outcome)
    }

    pub(crate) fn context(&self) -> &Arc<Context> {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::cell::Flow;
    use crate::error::Error;
    use crate::types::Outcome;

    #[test]
    fn settled_cell_reads_immediately() {
        let cell = Flow::completed(Outcome::Success(42));
        assert!(cell.is_completed());
        assert!(cell.is_expired());
        assert_eq!(cell.remaining(), Duration::ZERO);
        assert_eq!(cell.value().unwrap().value(), Some(&42));
    }

    #[test]
    fn settled_cell_listener_fires_inline() {
        let cell = Flow::completed(Outcome::Success(5));
        let seen = Arc::new(AtomicUsize::new(0));
        let slot = seen.clone();
        cell.on_complete(move |done| {
            slot.store(*done.value().unwrap().value().unwrap(), Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn settled_cell_waits_return_immediately() {
        let cell = Flow::completed(Outcome::Success(1));
        assert!(cell.wait().is_ok());
        assert!(cell.wait_value().is_some());
        assert!(cell.value_within(Duration::ZERO).is_some());
        cell.wait_blocking();
    }

    #[test]
    fn settled_cell_ignores_completion_attempts() {
        let cell = Flow::completed(Outcome::Success(1));
        cell.complete(Outcome::Success(2));
        cell.complete(Outcome::Failure(Error::computation("late")));
        assert_eq!(cell.value().unwrap().value(), Some(&1));
    }

    #[test]
    fn settled_failure_is_observable() {
        let cell: Flow<i32> = Flow::completed(Outcome::Failure(Error::match_failed()));
        let outcome = cell.value().unwrap();
        assert!(outcome.is_failure());
    }
}
