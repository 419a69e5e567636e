//! The error channel: an injected sink for faults that must not propagate.
//!
//! Listener panics and `for_each`/`receive` body faults are swallowed by
//! the completion protocol (notification must continue, and `complete`'s
//! caller is not the at-fault party). They are emitted here instead. The
//! sink is carried by the cell's [`Context`](crate::context::Context), not
//! resolved from globals.

use core::fmt;

use parking_lot::Mutex;

use crate::error::Error;

/// A sink for suppressed faults.
pub trait ErrorObserver: Send + Sync {
    /// Reports a fault that was suppressed on behalf of `source`.
    fn report(&self, error: &Error, source: &str, message: &str);
}

/// The default observer: structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TracingObserver {
    /// Creates the tracing-backed observer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ErrorObserver for TracingObserver {
    fn report(&self, error: &Error, source: &str, message: &str) {
        tracing::warn!(source = %source, error = %error, "{message}");
    }
}

/// A report captured by [`CollectingObserver`].
#[derive(Debug, Clone)]
pub struct Report {
    /// The suppressed fault.
    pub error: Error,
    /// Which part of the core suppressed it.
    pub source: String,
    /// Human-readable description.
    pub message: String,
}

/// A test observer that records every report.
#[derive(Default)]
pub struct CollectingObserver {
    reports: Mutex<Vec<Report>>,
}

impl CollectingObserver {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of captured reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    /// Returns true if nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    /// Removes and returns every captured report.
    #[must_use]
    pub fn take(&self) -> Vec<Report> {
        std::mem::take(&mut *self.reports.lock())
    }
}

impl ErrorObserver for CollectingObserver {
    fn report(&self, error: &Error, source: &str, message: &str) {
        self.reports.lock().push(Report {
            error: error.clone(),
            source: source.to_string(),
            message: message.to_string(),
        });
    }
}

impl fmt::Debug for CollectingObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectingObserver")
            .field("reports", &self.reports.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn collecting_observer_records_reports() {
        let observer = CollectingObserver::new();
        assert!(observer.is_empty());

        observer.report(&Error::match_failed(), "filter", "predicate rejected");
        observer.report(&Error::timeout(), "wait", "deadline passed");
        assert_eq!(observer.len(), 2);

        let reports = observer.take();
        assert_eq!(reports[0].error.kind(), ErrorKind::MatchFailed);
        assert_eq!(reports[0].source, "filter");
        assert_eq!(reports[1].message, "deadline passed");
        assert!(observer.is_empty());
    }
}
