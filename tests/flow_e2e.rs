//! End-to-end cell suite: submission through a real worker pool,
//! combinator chains across threads, and deadline behavior under load.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use confluence::test_utils::init_test_logging;
use confluence::{
    CollectingObserver, Error, ErrorKind, Flow, FlowBuilder, InlineScheduler, Outcome, WorkerPool,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn submit_completes_through_the_pool() {
    init_test_logging();
    let pool = WorkerPool::new(2);

    let cell = Flow::submit(&pool, TIMEOUT, || Ok(6 * 7));
    let outcome = cell.wait().expect("pool completes in time").value().unwrap();
    assert_eq!(outcome.value(), Some(&42));
}

#[test]
fn submit_body_error_becomes_a_failure_outcome() {
    init_test_logging();
    let pool = WorkerPool::new(1);

    let cell: Flow<i32> = Flow::submit(&pool, TIMEOUT, || {
        Err(Error::computation("backend unavailable"))
    });
    let outcome = cell.wait_value().expect("completed");
    let error = outcome.error().expect("failure stored");
    assert_eq!(error.kind(), ErrorKind::Computation);
    assert_eq!(error.to_string(), "Computation: backend unavailable");
}

#[test]
fn submit_body_panic_becomes_a_panicked_failure() {
    init_test_logging();
    let pool = WorkerPool::new(1);

    let cell: Flow<i32> = Flow::submit(&pool, TIMEOUT, || panic!("thunk exploded"));
    let outcome = cell.wait_value().expect("completed despite panic");
    let error = outcome.error().expect("failure stored");
    assert_eq!(error.kind(), ErrorKind::Panicked);
    assert!(error.to_string().contains("thunk exploded"));
}

#[test]
fn combinator_chain_across_pool_threads() {
    init_test_logging();
    let pool = WorkerPool::new(4);

    let result = Flow::submit(&pool, TIMEOUT, || Ok(10))
        .map(|v| v + 1)
        .filter(|v| *v > 5)
        .flat_map(|v| {
            let v = *v;
            Flow::completed(Outcome::Success(v * 2))
        })
        .collect(|v| Some(format!("result-{v}")));

    let outcome = result.wait_value().expect("chain completed");
    assert_eq!(outcome.value(), Some(&String::from("result-22")));
}

#[test]
fn failure_propagates_through_a_chain_unchanged() {
    init_test_logging();
    let pool = WorkerPool::new(2);

    let result = Flow::submit(&pool, TIMEOUT, || -> confluence::Result<i32> {
        Err(Error::computation("root cause"))
    })
    .map(|v| v + 1)
    .filter(|_| true)
    .flat_map(|v| Flow::completed(Outcome::Success(*v)));

    let outcome = result.wait_value().expect("failure reaches the end");
    let error = outcome.error().expect("still a failure");
    assert_eq!(error.kind(), ErrorKind::Computation);
    assert_eq!(error.to_string(), "Computation: root cause");
}

#[test]
fn many_listeners_from_many_threads_each_fire_once() {
    init_test_logging();
    let cell: Flow<i32> = Flow::deferred(TIMEOUT);
    let fired = Arc::new(AtomicUsize::new(0));

    let registrars: Vec<_> = (0..8)
        .map(|_| {
            let cell = cell.clone();
            let fired = fired.clone();
            thread::spawn(move || {
                for _ in 0..16 {
                    let fired = fired.clone();
                    cell.on_complete(move |_| {
                        fired.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        })
        .collect();

    let completer = {
        let cell = cell.clone();
        thread::spawn(move || {
            cell.complete(Outcome::Success(1));
        })
    };

    for handle in registrars {
        handle.join().unwrap();
    }
    completer.join().unwrap();

    // Every listener fired exactly once, whether it registered before or
    // after the completion raced past it.
    assert_eq!(fired.load(Ordering::SeqCst), 8 * 16);
}

#[test]
fn wait_value_times_out_while_pool_is_still_working() {
    init_test_logging();
    let pool = WorkerPool::new(1);

    let cell = Flow::submit(&pool, Duration::from_millis(10), || {
        thread::sleep(Duration::from_millis(200));
        Ok(1)
    });

    assert!(cell.wait_value().is_none());
    assert!(cell.wait().is_err());

    // The computation was never revoked: it still completes the cell.
    let outcome = cell.wait_blocking().value().expect("late completion lands");
    assert_eq!(outcome.value(), Some(&1));
}

#[test]
fn listener_panics_on_pool_thread_are_reported_not_fatal() {
    init_test_logging();
    let observer = Arc::new(CollectingObserver::new());
    let pool = WorkerPool::new(1);

    let cell: Flow<i32> = FlowBuilder::new()
        .timeout(TIMEOUT)
        .observer(observer.clone())
        .submit(&pool, || Ok(5));

    let fired = Arc::new(AtomicUsize::new(0));
    cell.on_complete(|_| panic!("listener on pool thread"));
    let counter = fired.clone();
    cell.on_complete(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let outcome = cell.wait_value().expect("completed");
    assert_eq!(outcome.value(), Some(&5));

    // The sibling listener fired even though an earlier one panicked.
    cell.wait_blocking();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(observer.take().len(), 1);
}

#[test]
fn inline_scheduler_matches_pool_semantics() {
    init_test_logging();
    let inline = Flow::submit(&InlineScheduler, TIMEOUT, || Ok(3)).map(|v| v * 3);
    assert_eq!(inline.value().unwrap().value(), Some(&9));
}
