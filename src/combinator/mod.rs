//! Derivation combinators: new cells from existing ones.
//!
//! Every combinator attaches one listener to the upstream cell and
//! derives a fresh cell carrying the upstream's remaining lifetime budget
//! and ambient context. The listener's only job is to translate the
//! upstream outcome:
//!
//! ```text
//! map(f):       Success(v) => Success(f(v))        Failure(e) => Failure(e)
//! flat_map(f):  Success(v) => complete_with(f(v))  Failure(e) => Failure(e)
//! filter(p):    Success(v) => p(v) ? Success(v) : Failure(MatchFailed)
//! collect(pf):  Success(v) => pf(v) is Some(u) ? Success(u) : Failure(MatchFailed)
//! for_each(f):  Success(v) => f(v), result discarded; no derived cell
//! receive(pf):  Success(v) => pf(v), None silently ignored; no derived cell
//! ```
//!
//! A panic inside `f`/`p`/`pf` becomes a `Panicked` failure in the
//! derived cell, except in `for_each`/`receive` where there is no derived
//! cell: the panic goes to the error observer and is otherwise dropped.
//!
//! Combinators never block; the derived cell completes on whichever
//! thread completes the upstream (or inline, when the upstream is
//! already resolved at attachment time). A `flat_map` body that blocks on
//! the cell it returns deadlocks; nothing detects this.

pub mod aggregate;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::cell::Flow;
use crate::error::Error;
use crate::types::Outcome;

impl<T: Send + Sync + 'static> Flow<T> {
    /// Derives a cell holding `f` applied to this cell's success value.
    ///
    /// Failures are forwarded untouched; a panic in `f` becomes a
    /// `Panicked` failure.
    #[must_use]
    pub fn map<U, F>(&self, f: F) -> Flow<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        let derived = Flow::deferred_in(self.remaining(), self.context().clone());
        let result = derived.clone();
        self.on_complete(move |done| {
            let outcome = done.value().expect("completed cell has an outcome");
            match &*outcome {
                Outcome::Success(value) => match catch_unwind(AssertUnwindSafe(|| f(value))) {
                    Ok(mapped) => {
                        result.complete(Outcome::Success(mapped));
                    }
                    Err(payload) => {
                        result.complete(Outcome::Failure(Error::panicked(payload.as_ref())));
                    }
                },
                Outcome::Failure(error) => {
                    result.complete(Outcome::Failure(error.clone()));
                }
            }
        });
        derived
    }

    /// Derives a cell that resolves to whatever the cell returned by `f`
    /// resolves to.
    #[must_use]
    pub fn flat_map<U, F>(&self, f: F) -> Flow<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Flow<U> + Send + 'static,
    {
        let derived = Flow::deferred_in(self.remaining(), self.context().clone());
        let result = derived.clone();
        self.on_complete(move |done| {
            let outcome = done.value().expect("completed cell has an outcome");
            match &*outcome {
                Outcome::Success(value) => match catch_unwind(AssertUnwindSafe(|| f(value))) {
                    Ok(inner) => {
                        result.complete_with(&inner);
                    }
                    Err(payload) => {
                        result.complete(Outcome::Failure(Error::panicked(payload.as_ref())));
                    }
                },
                Outcome::Failure(error) => {
                    result.complete(Outcome::Failure(error.clone()));
                }
            }
        });
        derived
    }

    /// Derives a cell that keeps the success value only when `predicate`
    /// accepts it, failing with `MatchFailed` otherwise.
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Flow<T>
    where
        P: FnOnce(&T) -> bool + Send + 'static,
    {
        let derived = Flow::deferred_in(self.remaining(), self.context().clone());
        let result = derived.clone();
        self.on_complete(move |done| {
            let outcome = done.value().expect("completed cell has an outcome");
            match &*outcome {
                Outcome::Success(value) => {
                    match catch_unwind(AssertUnwindSafe(|| predicate(value))) {
                        Ok(true) => {
                            result.complete_shared(Arc::clone(&outcome));
                        }
                        Ok(false) => {
                            result.complete(Outcome::Failure(
                                Error::match_failed().with_context("filter predicate rejected value"),
                            ));
                        }
                        Err(payload) => {
                            result.complete(Outcome::Failure(Error::panicked(payload.as_ref())));
                        }
                    }
                }
                Outcome::Failure(error) => {
                    result.complete(Outcome::Failure(error.clone()));
                }
            }
        });
        derived
    }

    /// Derives a cell holding the partial function's result, failing with
    /// `MatchFailed` where `partial` is undefined (returns `None`).
    #[must_use]
    pub fn collect<U, P>(&self, partial: P) -> Flow<U>
    where
        U: Send + Sync + 'static,
        P: FnOnce(&T) -> Option<U> + Send + 'static,
    {
        let derived = Flow::deferred_in(self.remaining(), self.context().clone());
        let result = derived.clone();
        self.on_complete(move |done| {
            let outcome = done.value().expect("completed cell has an outcome");
            match &*outcome {
                Outcome::Success(value) => match catch_unwind(AssertUnwindSafe(|| partial(value))) {
                    Ok(Some(collected)) => {
                        result.complete(Outcome::Success(collected));
                    }
                    Ok(None) => {
                        result.complete(Outcome::Failure(
                            Error::match_failed()
                                .with_context("partial function undefined at value"),
                        ));
                    }
                    Err(payload) => {
                        result.complete(Outcome::Failure(Error::panicked(payload.as_ref())));
                    }
                },
                Outcome::Failure(error) => {
                    result.complete(Outcome::Failure(error.clone()));
                }
            }
        });
        derived
    }

    /// Runs `f` for its effect on the success value. Failures are
    /// ignored; a panic in `f` goes to the error observer.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.on_complete(move |done| {
            let outcome = done.value().expect("completed cell has an outcome");
            if let Outcome::Success(value) = &*outcome {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(value))) {
                    let error = Error::panicked(payload.as_ref());
                    done.context()
                        .observer()
                        .report(&error, "for_each", "effect body panicked; dropped");
                }
            }
        });
    }

    /// Like [`for_each`](Self::for_each), but with a partial function:
    /// where `partial` is undefined the value is silently ignored.
    pub fn receive<P>(&self, partial: P)
    where
        P: FnOnce(&T) -> Option<()> + Send + 'static,
    {
        self.on_complete(move |done| {
            let outcome = done.value().expect("completed cell has an outcome");
            if let Outcome::Success(value) = &*outcome {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| partial(value))) {
                    let error = Error::panicked(payload.as_ref());
                    done.context()
                        .observer()
                        .report(&error, "receive", "partial body panicked; dropped");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::cell::{Flow, FlowBuilder};
    use crate::error::{Error, ErrorKind};
    use crate::observer::CollectingObserver;
    use crate::test_utils::init_test_logging;
    use crate::types::Outcome;

    const LONG: Duration = Duration::from_secs(5);

    #[test]
    fn map_applies_to_success() {
        init_test_logging();
        let cell = Flow::completed(Outcome::Success(21));
        let doubled = cell.map(|v| v * 2);
        assert_eq!(doubled.value().unwrap().value(), Some(&42));
    }

    #[test]
    fn map_forwards_failure_untouched() {
        init_test_logging();
        let cell: Flow<i32> = Flow::completed(Outcome::Failure(Error::computation("upstream")));
        let mapped = cell.map(|v| v * 2);
        let outcome = mapped.value().unwrap();
        let error = outcome.error().unwrap();
        assert_eq!(error.kind(), ErrorKind::Computation);
        assert_eq!(error.to_string(), "Computation: upstream");
    }

    #[test]
    fn map_captures_body_panic() {
        init_test_logging();
        let cell = Flow::completed(Outcome::Success(1));
        let mapped: Flow<i32> = cell.map(|_| panic!("map body"));
        let outcome = mapped.value().unwrap();
        assert_eq!(outcome.error().map(Error::kind), Some(ErrorKind::Panicked));
    }

    #[test]
    fn map_on_pending_cell_completes_later() {
        init_test_logging();
        let cell: Flow<i32> = Flow::deferred(LONG);
        let mapped = cell.map(|v| v + 1);
        assert!(!mapped.is_completed());

        cell.complete(Outcome::Success(9));
        assert_eq!(mapped.value().unwrap().value(), Some(&10));
    }

    #[test]
    fn flat_map_chains_cells() {
        init_test_logging();
        let cell = Flow::completed(Outcome::Success(3));
        let chained = cell.flat_map(|v| {
            let inner: Flow<String> = Flow::deferred(LONG);
            inner.complete(Outcome::Success(format!("value-{v}")));
            inner
        });
        assert_eq!(
            chained.value().unwrap().value(),
            Some(&String::from("value-3"))
        );
    }

    #[test]
    fn flat_map_tracks_pending_inner_cell() {
        init_test_logging();
        let outer: Flow<i32> = Flow::deferred(LONG);
        let inner: Flow<i32> = Flow::deferred(LONG);

        let inner_clone = inner.clone();
        let chained = outer.flat_map(move |_| inner_clone);

        outer.complete(Outcome::Success(1));
        assert!(!chained.is_completed());

        inner.complete(Outcome::Success(2));
        assert_eq!(chained.value().unwrap().value(), Some(&2));
    }

    #[test]
    fn flat_map_captures_body_panic() {
        init_test_logging();
        let cell = Flow::completed(Outcome::Success(1));
        let chained: Flow<i32> = cell.flat_map(|_| -> Flow<i32> { panic!("flat_map body") });
        let outcome = chained.value().unwrap();
        assert_eq!(outcome.error().map(Error::kind), Some(ErrorKind::Panicked));
    }

    #[test]
    fn filter_keeps_accepted_values() {
        init_test_logging();
        let cell = Flow::completed(Outcome::Success(10));
        let kept = cell.filter(|v| *v > 5);
        assert_eq!(kept.value().unwrap().value(), Some(&10));
    }

    #[test]
    fn filter_rejects_with_match_failure() {
        init_test_logging();
        let cell = Flow::completed(Outcome::Success(2));
        let rejected = cell.filter(|v| *v > 5);
        let outcome = rejected.value().unwrap();
        assert_eq!(
            outcome.error().map(Error::kind),
            Some(ErrorKind::MatchFailed)
        );
    }

    #[test]
    fn filter_forwards_failure_and_captures_panic() {
        init_test_logging();
        let failed: Flow<i32> = Flow::completed(Outcome::Failure(Error::computation("upstream")));
        let forwarded = failed.filter(|_| true);
        assert_eq!(
            forwarded.value().unwrap().error().map(Error::kind),
            Some(ErrorKind::Computation)
        );

        let cell = Flow::completed(Outcome::Success(1));
        let panicked = cell.filter(|_| panic!("predicate"));
        assert_eq!(
            panicked.value().unwrap().error().map(Error::kind),
            Some(ErrorKind::Panicked)
        );
    }

    #[test]
    fn collect_applies_partial_function() {
        init_test_logging();
        let cell = Flow::completed(Outcome::Success(7));
        let collected = cell.collect(|v| (*v % 2 == 1).then(|| format!("odd-{v}")));
        assert_eq!(
            collected.value().unwrap().value(),
            Some(&String::from("odd-7"))
        );

        let even = Flow::completed(Outcome::Success(8));
        let undefined: Flow<String> = even.collect(|v| (*v % 2 == 1).then(|| format!("odd-{v}")));
        assert_eq!(
            undefined.value().unwrap().error().map(Error::kind),
            Some(ErrorKind::MatchFailed)
        );
    }

    #[test]
    fn for_each_runs_on_success_only() {
        init_test_logging();
        let hits = Arc::new(AtomicUsize::new(0));

        let ok = Flow::completed(Outcome::Success(5));
        let counter = hits.clone();
        ok.for_each(move |v| {
            counter.fetch_add(*v, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 5);

        let failed: Flow<usize> = Flow::completed(Outcome::Failure(Error::computation("nope")));
        let counter = hits.clone();
        failed.for_each(move |v| {
            counter.fetch_add(*v, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn for_each_panic_goes_to_observer() {
        init_test_logging();
        let observer = Arc::new(CollectingObserver::new());
        let cell: Flow<i32> = FlowBuilder::new()
            .timeout(LONG)
            .observer(observer.clone())
            .completed(Outcome::Success(1));

        cell.for_each(|_| panic!("effect body"));

        let reports = observer.take();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].source, "for_each");
        assert_eq!(reports[0].error.kind(), ErrorKind::Panicked);
    }

    #[test]
    fn receive_ignores_undefined_partial() {
        init_test_logging();
        let hits = Arc::new(AtomicUsize::new(0));

        let cell = Flow::completed(Outcome::Success(4));
        let counter = hits.clone();
        cell.receive(move |v| {
            (*v % 2 == 1).then(|| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        // Partial undefined at 4: silently ignored.
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let odd = Flow::completed(Outcome::Success(5));
        let counter = hits.clone();
        odd.receive(move |v| {
            (*v % 2 == 1).then(|| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn derived_cells_inherit_remaining_budget() {
        init_test_logging();
        let cell: Flow<i32> = Flow::deferred(Duration::ZERO);
        let mapped = cell.map(|v| *v);
        // Upstream had no budget left, so the derived cell is expired too.
        assert!(mapped.is_expired());
    }
}
