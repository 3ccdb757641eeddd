//! End-to-end scenarios exercised through the public API only (no access to
//! crate internals).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use game_tasks::{DirectExecutor, FutureCell};

#[test]
fn scenario_basic_value() {
    let cell: FutureCell<&'static str> = FutureCell::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let runs2 = runs.clone();
    cell.add_listener(move || { runs2.fetch_add(1, Ordering::SeqCst); }, Arc::new(DirectExecutor));

    assert!(cell.set("x"));

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(cell.get().unwrap(), "x");
    assert!(cell.is_done());
}

#[test]
fn scenario_racing_set() {
    let cell: FutureCell<&'static str> = FutureCell::new();
    let barrier = Arc::new(Barrier::new(2));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|v| {
            let cell = cell.clone();
            let barrier = barrier.clone();
            let winners = winners.clone();
            thread::spawn(move || {
                barrier.wait();
                if cell.set(v) {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    let value = cell.get().unwrap();
    assert!(value == "a" || value == "b");
}

#[test]
fn scenario_cancel_vs_set() {
    let cell: FutureCell<i32> = FutureCell::new();
    assert!(cell.cancel(true));
    assert!(!cell.set(42));

    let err = cell.get().unwrap_err();
    assert!(err.is_cancelled());
    assert!(err.was_interrupted());
}

#[test]
fn scenario_long_delegation_chain() {
    const N: usize = 10_000;
    let cells: Vec<FutureCell<i32>> = (0..=N).map(|_| FutureCell::new()).collect();
    for i in 0..N {
        assert!(cells[i].delegate_to(cells[i + 1].clone()));
    }

    assert!(cells[N].set(42));

    assert_eq!(cells[0].get().unwrap(), 42);
}

#[test]
fn scenario_immediate_listener() {
    let cell: FutureCell<&'static str> = FutureCell::new();
    assert!(cell.set("x"));

    let ran = Arc::new(AtomicUsize::new(0));
    let ran2 = ran.clone();
    cell.add_listener(move || { ran2.fetch_add(1, Ordering::SeqCst); }, Arc::new(DirectExecutor));

    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn scenario_timed_wait_crosses_completion() {
    let cell: FutureCell<&'static str> = FutureCell::new();
    let cell2 = cell.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        cell2.set("y");
    });

    let result = cell.get_timeout(Duration::from_millis(500));
    handle.join().unwrap();

    assert_eq!(result.unwrap(), "y");
}

#[test]
fn scenario_timed_wait_without_completion_times_out() {
    let cell: FutureCell<&'static str> = FutureCell::new();
    let result = cell.get_timeout(Duration::from_millis(30));
    assert!(result.unwrap_err().is_timeout());
    assert!(!cell.is_done());
}
