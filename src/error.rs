//! Error types and error handling strategy for Confluence.
//!
//! This module defines the core error types used throughout the crate.
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Failures stored in a cell outcome are ordinary values that flow
//!   through combinators unchanged
//! - Panics in user-supplied bodies are isolated and converted to
//!   `ErrorKind::Panicked`
//! - Timeouts belong to the waiting caller, never to the cell itself

use core::fmt;
use std::any::Any;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Waiting ===
    /// Deadline passed while blocking on a cell.
    Timeout,

    // === Computation ===
    /// A user-supplied thunk or combinator body returned an error.
    Computation,
    /// A user-supplied thunk, combinator body, or predicate panicked.
    Panicked,

    // === Selection ===
    /// A filter predicate rejected the value, or a partial function was
    /// undefined at it.
    MatchFailed,
    /// A reduce was requested over an empty iterable.
    EmptyReduce,
}

/// The main error type for Confluence operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error is a timeout raised by a blocking wait.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Returns true if this error came from a rejecting predicate or an
    /// undefined partial function.
    #[must_use]
    pub const fn is_match_failed(&self) -> bool {
        matches!(self.kind, ErrorKind::MatchFailed)
    }

    /// Returns true if this error carries a captured panic.
    #[must_use]
    pub const fn is_panicked(&self) -> bool {
        matches!(self.kind, ErrorKind::Panicked)
    }

    /// Adds deterministic context text to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a timeout error for a wait that outlived its deadline.
    #[must_use]
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }

    /// Creates a computation error with the given context.
    #[must_use]
    pub fn computation(ctx: impl Into<String>) -> Self {
        Self::new(ErrorKind::Computation).with_context(ctx)
    }

    /// Creates a match-failure error for a rejected value.
    #[must_use]
    pub fn match_failed() -> Self {
        Self::new(ErrorKind::MatchFailed)
    }

    /// Creates the error produced by reducing an empty iterable.
    #[must_use]
    pub fn empty_reduce() -> Self {
        Self::new(ErrorKind::EmptyReduce).with_context("reduce over empty iterable")
    }

    /// Creates an error from a captured panic payload.
    #[must_use]
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        Self::new(ErrorKind::Panicked).with_context(panic_message(payload))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Extracts a human-readable message from a panic payload.
///
/// Panics raised with `panic!("literal")` carry a `&str`; formatted panics
/// carry a `String`. Anything else gets an opaque marker.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Attach a context string on error.
    fn context(self, ctx: impl Into<String>) -> Result<T>;
    /// Attach context computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(ctx))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

/// A specialized Result type for Confluence operations.
pub type Result<T> = core::result::Result<T, Error>;
