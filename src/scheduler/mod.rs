//! The submission port.
//!
//! The core never runs initial computations itself; it hands a thunk to a
//! [`Scheduler`] and completes the cell from inside that thunk. The trait
//! is the entire coupling surface: anything that can run a boxed closure
//! on some thread, at some point, qualifies.
//!
//! Two implementations ship with the crate: [`WorkerPool`], a fixed-size
//! thread pool, and [`InlineScheduler`], which runs thunks on the
//! submitting thread (useful in tests and for already-cheap bodies).

pub mod pool;

pub use pool::WorkerPool;

/// A unit of deferred work.
pub type Thunk = Box<dyn FnOnce() + Send>;

/// An executor capability that accepts thunks for later execution.
pub trait Scheduler: Send + Sync {
    /// Queues `thunk` to run at some later point on some thread.
    fn submit(&self, thunk: Thunk);
}

impl<S: Scheduler + ?Sized> Scheduler for std::sync::Arc<S> {
    fn submit(&self, thunk: Thunk) {
        (**self).submit(thunk);
    }
}

/// Runs every thunk synchronously on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn submit(&self, thunk: Thunk) {
        thunk();
    }
}
