//! Builder for cells with injected capabilities.
//!
//! The builder is the "set it once" surface: configure a timeout, clock,
//! and error observer, then mint as many cells as needed. Every cell a
//! combinator derives from a built cell inherits the same capabilities.

use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::error::Result;
use crate::observer::ErrorObserver;
use crate::scheduler::Scheduler;
use crate::types::time::Clock;
use crate::types::Outcome;

use super::Flow;

/// Default lifetime budget for cells built without an explicit timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configures and constructs [`Flow`] cells.
#[derive(Default)]
pub struct FlowBuilder {
    timeout: Option<Duration>,
    clock: Option<Arc<dyn Clock>>,
    observer: Option<Arc<dyn ErrorObserver>>,
}

impl FlowBuilder {
    /// Creates a builder with the default timeout and capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lifetime budget for built cells.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Removes the deadline: waits park until completion.
    #[must_use]
    pub fn unbounded(self) -> Self {
        self.timeout(Duration::MAX)
    }

    /// Injects a clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Injects an error observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ErrorObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn context(&self) -> Arc<Context> {
        match (&self.clock, &self.observer) {
            (None, None) => Arc::new(Context::default()),
            (clock, observer) => {
                let defaults = Context::default();
                Arc::new(Context::new(
                    clock.clone().unwrap_or_else(|| defaults.clock().clone()),
                    observer
                        .clone()
                        .unwrap_or_else(|| defaults.observer().clone()),
                ))
            }
        }
    }

    fn budget(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Builds an empty deferred cell.
    #[must_use]
    pub fn deferred<T: Send + Sync + 'static>(&self) -> Flow<T> {
        Flow::deferred_in(self.budget(), self.context())
    }

    /// Builds a cell already resolved to `outcome`.
    #[must_use]
    pub fn completed<T: Send + Sync + 'static>(&self, outcome: Outcome<T>) -> Flow<T> {
        Flow::completed_in(outcome, self.context())
    }

    /// Submits `body` to `scheduler` and returns the cell it completes.
    pub fn submit<T, S, F>(&self, scheduler: &S, body: F) -> Flow<T>
    where
        T: Send + Sync + 'static,
        S: Scheduler + ?Sized,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Flow::submit_in(scheduler, self.budget(), self.context(), body)
    }
}

impl std::fmt::Debug for FlowBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowBuilder")
            .field("timeout", &self.budget())
            .field("custom_clock", &self.clock.is_some())
            .field("custom_observer", &self.observer.is_some())
            .finish()
    }
}
