//! Confluence: deferred-result cells with non-blocking combinators and
//! fan-in aggregation for actor-style runtimes.
//!
//! # Overview
//!
//! A [`Flow<T>`] is a single-assignment cell for a value computed
//! elsewhere, typically on a worker pool. Consumers chain dependent
//! computations onto it without blocking, aggregate many outstanding
//! cells into one, or park a thread on it until the result or a deadline
//! arrives.
//!
//! # Core Guarantees
//!
//! - **Single assignment**: the first completion wins; later completions
//!   are no-ops, so completion races are benign
//! - **Exactly-once listeners**: each registered listener fires once, in
//!   registration order, outside the cell lock
//! - **Transparent failures**: a failure flows through every combinator
//!   unchanged; only `for_each`/`receive` drop failures silently
//! - **Timeouts stay with the waiter**: a deadline raises in the blocked
//!   caller and is never stored in the cell; completion after the
//!   deadline is still observable
//! - **No ambient authority**: scheduler, clock, and error observer are
//!   injected capabilities, never globals
//!
//! # Module Structure
//!
//! - [`types`]: Core types (outcomes, monotonic time, clocks)
//! - [`cell`]: The deferred-result cell and its builder
//! - [`combinator`]: Derivation combinators and fan-in aggregators
//! - [`scheduler`]: The submission port and the worker pool
//! - [`observer`]: The injected sink for suppressed faults
//! - [`context`]: Ambient capabilities carried along a composition tree
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```
//! use confluence::{fold, Flow, WorkerPool};
//! use std::time::Duration;
//!
//! let pool = WorkerPool::new(4);
//! let timeout = Duration::from_secs(1);
//!
//! let cells: Vec<Flow<u64>> = (1..=3)
//!     .map(|n| Flow::submit(&pool, timeout, move || Ok(n * n)))
//!     .collect();
//!
//! let total = fold(0, timeout, cells, |acc, v| acc + v);
//! assert_eq!(*total.wait_value().unwrap().value().unwrap(), 14);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod cell;
pub mod combinator;
pub mod context;
pub mod error;
pub mod observer;
pub mod scheduler;
#[cfg(feature = "test-util")]
pub mod test_utils;
pub mod types;

// Re-exports for convenient access to core types
pub use cell::builder::DEFAULT_TIMEOUT;
pub use cell::{Flow, FlowBuilder};
pub use combinator::aggregate::{first_completed_of, fold, reduce, sequence, traverse};
pub use context::Context;
pub use error::{panic_message, Error, ErrorKind, Result, ResultExt};
pub use observer::{CollectingObserver, ErrorObserver, Report, TracingObserver};
pub use scheduler::{InlineScheduler, Scheduler, Thunk, WorkerPool};
pub use types::{Clock, ManualClock, MonotonicClock, Outcome, Time};
