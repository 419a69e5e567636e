//! Fixed-size worker pool for executing submitted thunks.
//!
//! The pool owns a set of OS threads draining a lock-free run queue.
//! Idle workers park on a condition variable with a bounded interval, so
//! a wakeup lost to the submit/park race costs at most one interval.
//!
//! ## Shutdown
//!
//! `shutdown` is graceful: workers finish the thunks already queued, then
//! exit. Dropping the pool shuts it down and joins every worker. Thunks
//! submitted after shutdown are dropped with a warning.
//!
//! ## Panics
//!
//! A panicking thunk never takes its worker down; the panic is caught and
//! logged, and the worker moves on to the next thunk. (The submission
//! path in [`Flow::submit`](crate::Flow::submit) converts body panics
//! into failure outcomes before they ever reach the pool, so this guard
//! matters only for raw thunks.)

use std::fmt;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_queue::SegQueue;

use super::{Scheduler, Thunk};

/// Upper bound on how long an idle worker sleeps between queue checks.
const PARK_INTERVAL: Duration = Duration::from_millis(100);

/// A fixed-size thread pool implementing [`Scheduler`].
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct PoolInner {
    /// Work queue.
    queue: SegQueue<Thunk>,
    /// Number of thunks waiting in the queue.
    queued: AtomicUsize,
    /// Number of workers currently executing a thunk.
    busy: AtomicUsize,
    /// Shutdown flag.
    shutdown: AtomicBool,
    /// Pairs with `available` for idle parking.
    idle: Mutex<()>,
    /// Signalled on submit and on shutdown.
    available: Condvar,
}

impl WorkerPool {
    /// Spawns a pool with `workers` threads (at least one).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let inner = Arc::new(PoolInner {
            queue: SegQueue::new(),
            queued: AtomicUsize::new(0),
            busy: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            idle: Mutex::new(()),
            available: Condvar::new(),
        });
        let handles = (0..workers)
            .map(|index| {
                let inner = Arc::clone(&inner);
                thread::Builder::new()
                    .name(format!("confluence-worker-{index}"))
                    .spawn(move || worker_loop(&inner))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self {
            inner,
            workers: Mutex::new(handles),
        }
    }

    /// Returns the number of thunks waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.queued.load(Ordering::Relaxed)
    }

    /// Returns the number of workers currently executing a thunk.
    #[must_use]
    pub fn busy(&self) -> usize {
        self.inner.busy.load(Ordering::Relaxed)
    }

    /// Drains already-queued thunks, stops the workers, and joins them.
    ///
    /// Safe to call more than once; later calls are no-ops.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        {
            let _guard = self.inner.idle.lock().expect("worker pool lock poisoned");
            self.inner.available.notify_all();
        }
        let handles = mem::take(&mut *self.workers.lock().expect("worker pool lock poisoned"));
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Scheduler for WorkerPool {
    fn submit(&self, thunk: Thunk) {
        if self.inner.shutdown.load(Ordering::Acquire) {
            tracing::warn!("thunk submitted after shutdown; dropped");
            return;
        }
        self.inner.queue.push(thunk);
        self.inner.queued.fetch_add(1, Ordering::AcqRel);
        let _guard = self.inner.idle.lock().expect("worker pool lock poisoned");
        self.inner.available.notify_one();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let workers = self
            .workers
            .lock()
            .map(|handles| handles.len())
            .unwrap_or(0);
        f.debug_struct("WorkerPool")
            .field("workers", &workers)
            .field("queued", &self.queued())
            .field("busy", &self.busy())
            .field("shutdown", &self.inner.shutdown.load(Ordering::Relaxed))
            .finish()
    }
}

fn worker_loop(inner: &PoolInner) {
    loop {
        if let Some(thunk) = inner.queue.pop() {
            inner.queued.fetch_sub(1, Ordering::AcqRel);
            inner.busy.fetch_add(1, Ordering::AcqRel);
            if catch_unwind(AssertUnwindSafe(thunk)).is_err() {
                tracing::warn!("submitted thunk panicked; worker continues");
            }
            inner.busy.fetch_sub(1, Ordering::AcqRel);
            continue;
        }
        if inner.shutdown.load(Ordering::Acquire) {
            return;
        }
        let guard = inner.idle.lock().expect("worker pool lock poisoned");
        if inner.queue.is_empty() && !inner.shutdown.load(Ordering::Acquire) {
            let _ = inner
                .available
                .wait_timeout(guard, PARK_INTERVAL)
                .expect("worker pool lock poisoned");
        }
    }
}
