//! Aggregators: one cell from many.
//!
//! All aggregators are non-blocking: they attach listeners to every input
//! and let whichever thread completes an input drive the aggregate
//! forward. They must tolerate interleaved notification from any subset
//! of inputs in any order.
//!
//! Two ordering regimes coexist on purpose:
//!
//! - [`fold`] consumes successes in **completion order**, maximising
//!   progress without waiting on stragglers. Callers whose operator is
//!   not commutative will observe nondeterministic fold order.
//! - [`sequence`] (and [`traverse`]) produce values in **input order**.
//!
//! The result cell inherits the ambient context of the first input, so a
//! composition tree keeps one clock and one error channel.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;

use crate::cell::Flow;
use crate::context::Context;
use crate::error::Error;
use crate::types::Outcome;

fn inherited_context<T: Send + Sync + 'static>(inputs: &[Flow<T>]) -> Arc<Context> {
    inputs
        .first()
        .map_or_else(|| Arc::new(Context::default()), |cell| cell.context().clone())
}

/// Resolves to the outcome of the first input to complete, success or
/// failure. Later completions are ignored.
///
/// An empty input iterable yields a cell that never completes.
#[must_use]
pub fn first_completed_of<T, I>(cells: I, timeout: Duration) -> Flow<T>
where
    T: Send + Sync + 'static,
    I: IntoIterator<Item = Flow<T>>,
{
    let inputs: Vec<Flow<T>> = cells.into_iter().collect();
    let result = Flow::deferred_in(timeout, inherited_context(&inputs));
    for cell in &inputs {
        let winner_slot = result.clone();
        cell.on_complete(move |done| {
            winner_slot.complete_shared(done.value().expect("completed cell has an outcome"));
        });
    }
    result
}

/// Left-folds input successes with `op` in **completion order**.
///
/// The first failure observed among the inputs becomes the result, as
/// does a panic inside `op`. Empty input resolves immediately to
/// `Success(zero)`.
#[must_use]
pub fn fold<A, T, I, F>(zero: A, timeout: Duration, cells: I, op: F) -> Flow<A>
where
    A: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Flow<T>>,
    F: Fn(A, &T) -> A + Send + Sync + 'static,
{
    let inputs: Vec<Flow<T>> = cells.into_iter().collect();
    let context = inherited_context(&inputs);
    if inputs.is_empty() {
        return Flow::completed_in(Outcome::Success(zero), context);
    }

    let result = Flow::deferred_in(timeout, context);
    let state = Arc::new(FoldState {
        queue: SegQueue::new(),
        arrived: AtomicUsize::new(0),
        total: inputs.len(),
        zero: Mutex::new(Some(zero)),
        op,
        result: result.clone(),
    });
    for cell in &inputs {
        let state = Arc::clone(&state);
        cell.on_complete(move |done| state.observe(done));
    }
    result
}

struct FoldState<A, T, F> {
    queue: SegQueue<T>,
    arrived: AtomicUsize,
    total: usize,
    zero: Mutex<Option<A>>,
    op: F,
    result: Flow<A>,
}

impl<A, T, F> FoldState<A, T, F>
where
    A: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(A, &T) -> A + Send + Sync + 'static,
{
    fn observe(&self, done: &Flow<T>) {
        let outcome = done.value().expect("completed cell has an outcome");
        match &*outcome {
            Outcome::Failure(error) => {
                self.result.complete(Outcome::Failure(error.clone()));
                while self.queue.pop().is_some() {}
            }
            Outcome::Success(value) => {
                self.queue.push(value.clone());
                // The thread that observes the final arrival folds inline.
                if self.arrived.fetch_add(1, Ordering::AcqRel) + 1 == self.total {
                    self.finish();
                }
            }
        }
    }

    fn finish(&self) {
        let Some(seed) = self.zero.lock().take() else {
            return;
        };
        let folded = catch_unwind(AssertUnwindSafe(|| {
            let mut acc = seed;
            while let Some(value) = self.queue.pop() {
                acc = (self.op)(acc, &value);
            }
            acc
        }));
        match folded {
            Ok(acc) => {
                self.result.complete(Outcome::Success(acc));
            }
            Err(payload) => {
                self.result
                    .complete(Outcome::Failure(Error::panicked(payload.as_ref())));
            }
        }
    }
}

/// Like [`fold`], seeded by the first-completed success; the remaining
/// inputs are folded over it.
///
/// A failure that completes first becomes the result. Empty input
/// resolves immediately to an `EmptyReduce` failure.
#[must_use]
pub fn reduce<T, I, F>(cells: I, timeout: Duration, op: F) -> Flow<T>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Flow<T>>,
    F: Fn(T, &T) -> T + Send + Sync + 'static,
{
    let inputs: Arc<Vec<Flow<T>>> = Arc::new(cells.into_iter().collect());
    let context = inherited_context(&inputs);
    if inputs.is_empty() {
        return Flow::completed_in(Outcome::Failure(Error::empty_reduce()), context);
    }

    let result = Flow::deferred_in(timeout, context);
    let seeded = Arc::new(AtomicBool::new(false));
    let op = Arc::new(op);
    for cell in inputs.iter() {
        let seeded = Arc::clone(&seeded);
        let inputs = Arc::clone(&inputs);
        let op = Arc::clone(&op);
        let target = result.clone();
        let me = cell.clone();
        cell.on_complete(move |done| {
            // One-shot election: only the first completion seeds the fold.
            if seeded.swap(true, Ordering::AcqRel) {
                return;
            }
            let outcome = done.value().expect("completed cell has an outcome");
            match &*outcome {
                Outcome::Failure(error) => {
                    target.complete(Outcome::Failure(error.clone()));
                }
                Outcome::Success(seed) => {
                    // Identity exclusion: every alias of the seed cell is
                    // removed, so a cell passed at two positions is not
                    // folded in a second time.
                    let rest: Vec<Flow<T>> = inputs
                        .iter()
                        .filter(|other| !other.same_cell(&me))
                        .cloned()
                        .collect();
                    let folded =
                        fold(seed.clone(), timeout, rest, move |acc, value| (*op)(acc, value));
                    target.complete_with(&folded);
                }
            }
        });
    }
    result
}

/// Resolves to all input successes in **input order**.
///
/// Built by threading an accumulator cell through `flat_map`/`map`, so
/// the first failure (in input order) short-circuits the result.
#[must_use]
pub fn sequence<T, I>(cells: I, timeout: Duration) -> Flow<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Flow<T>>,
{
    let inputs: Vec<Flow<T>> = cells.into_iter().collect();
    let context = inherited_context(&inputs);
    let result = Flow::deferred_in(timeout, context.clone());

    let mut acc: Flow<Vec<T>> =
        Flow::completed_in(Outcome::Success(Vec::with_capacity(inputs.len())), context);
    for cell in inputs {
        acc = acc.flat_map(move |collected: &Vec<T>| {
            let mut collected = collected.clone();
            cell.map(move |value| {
                collected.push(value.clone());
                collected
            })
        });
    }
    result.complete_with(&acc);
    result
}

/// Maps each item to a cell with `f`, then [`sequence`]s the results.
#[must_use]
pub fn traverse<A, T, I, F>(items: I, timeout: Duration, f: F) -> Flow<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = A>,
    F: FnMut(A) -> Flow<T>,
{
    let cells: Vec<Flow<T>> = items.into_iter().map(f).collect();
    sequence(cells, timeout)
}
