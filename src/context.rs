//! Ambient capabilities carried by a cell.
//!
//! A cell needs two external capabilities: a clock for deadline math and
//! an observer for suppressed faults. Both are injected at construction
//! and inherited by every cell derived through combinators, so a whole
//! composition tree shares one clock and one error channel without any
//! global state.

use std::sync::Arc;

use crate::observer::{ErrorObserver, TracingObserver};
use crate::types::time::{Clock, MonotonicClock};

/// Clock and error-channel capabilities shared along a composition tree.
pub struct Context {
    clock: Arc<dyn Clock>,
    observer: Arc<dyn ErrorObserver>,
}

impl Context {
    /// Creates a context from explicit capabilities.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, observer: Arc<dyn ErrorObserver>) -> Self {
        Self { clock, observer }
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the error observer.
    #[must_use]
    pub fn observer(&self) -> &Arc<dyn ErrorObserver> {
        &self.observer
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(
            Arc::new(MonotonicClock::new()),
            Arc::new(TracingObserver::new()),
        )
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}
