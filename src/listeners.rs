//! The listener Treiber stack and the `Executor` contract `game_tasks`
//! consumes.
//!
//! A user listener is a plain `Runnable`-shaped callback, not one
//! parameterized over the cell's outcome: like Guava's
//! `ListenableFuture.addListener`, a listener that wants the value calls
//! back into the cell's own `get()` (cheap once terminal, a non-blocking
//! fast path by then). The one listener kind that *is* special-cased is the
//! delegation adapter: rather than being an opaque callback, it names the
//! downstream cell directly, which is what lets the completion engine in
//! [`cell`](crate::cell) dispatch it by switching its working cell instead
//! of recursing.

use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::cell::FutureCell;

/// Something that can eventually run a boxed task.
///
/// Exceptions raised by `execute` itself (as opposed to by the task it runs)
/// are caught at the call site, logged, and do not corrupt the cell: the
/// cell has already committed its terminal state by the time any executor
/// runs, so a misbehaving executor can only lose that one listener's
/// notification.
pub trait Executor: Send + Sync {
    /// Runs `task`, eventually. Implementations that run `task` inline on
    /// the calling thread (a "direct executor") are valid and are in fact
    /// the default (see [`DirectExecutor`]); heavier listeners should
    /// supply a real thread-pool-backed executor instead, since direct
    /// listeners run on the thread that completed the cell.
    fn execute(&self, task: Box<dyn FnOnce() + Send>);
}

/// An [`Executor`] that runs the task synchronously, on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectExecutor;

impl Executor for DirectExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        run_listener(task);
    }
}

impl<F> Executor for F
where
    F: Fn(Box<dyn FnOnce() + Send>) + Send + Sync,
{
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        (self)(task);
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// One entry in a [`ListenerStack`].
pub(crate) enum Entry<V> {
    User(Task, Arc<dyn Executor>),
    /// A downstream cell that delegated to this one, waiting to adopt its
    /// transcribed outcome.
    Adapter(FutureCell<V>),
}

struct Node<V> {
    entry: Entry<V>,
    next: AtomicPtr<Node<V>>,
}

/// A lock-free, single-drain stack of listener entries.
///
/// Pushing after the stack has been drained (tombstoned) is rejected so the
/// caller can run the listener immediately instead.
pub(crate) struct ListenerStack<V> {
    head: AtomicPtr<Node<V>>,
}

/// Sentinel installed as the head once the stack has been drained. Any
/// non-null, non-dangling value works as long as it is distinguishable from
/// a real node pointer; this one is never dereferenced.
fn tombstone<V>() -> *mut Node<V> {
    ptr::NonNull::<Node<V>>::dangling().as_ptr()
}

impl<V> ListenerStack<V> {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Registers `entry`. Returns `Err` with the entry back if the stack
    /// was already tombstoned; the caller is expected to act on it
    /// immediately in that case.
    pub(crate) fn push(&self, entry: Entry<V>) -> Result<(), Entry<V>> {
        let mut node = Box::new(Node {
            entry,
            next: AtomicPtr::new(ptr::null_mut()),
        });

        loop {
            let head = self.head.load(Ordering::Acquire);
            if head == tombstone::<V>() {
                return Err(node.entry);
            }
            node.next.store(head, Ordering::Relaxed);
            let node_ptr = Box::into_raw(node);
            match self
                .head
                .compare_exchange(head, node_ptr, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(()),
                Err(_) => {
                    // SAFETY: the CAS never published `node_ptr`, so we are
                    // its sole owner and may reclaim it to retry.
                    node = unsafe { Box::from_raw(node_ptr) };
                }
            }
        }
    }

    /// Swaps the head for the tombstone and returns the captured chain in
    /// insertion order. Only ever called once per cell, by the single
    /// thread whose CAS transitioned the cell to a terminal state; from
    /// that point on `push` always observes the tombstone, so the returned
    /// chain is never concurrently mutated and can be reclaimed directly.
    pub(crate) fn drain(&self) -> Vec<Entry<V>> {
        let head = self.head.swap(tombstone::<V>(), Ordering::AcqRel);
        let mut items = Vec::new();
        let mut cursor = head;
        while !cursor.is_null() && cursor != tombstone::<V>() {
            // SAFETY: nodes are pushed via `Box::into_raw` and only ever
            // reclaimed here, by the single thread draining after the
            // tombstone swap above has made further pushes impossible.
            let node = unsafe { Box::from_raw(cursor) };
            let next = node.next.load(Ordering::Acquire);
            items.push(node.entry);
            cursor = next;
        }
        items.reverse();
        items
    }
}

impl<V> Drop for ListenerStack<V> {
    fn drop(&mut self) {
        // A cell may be dropped while still pending (no listeners were ever
        // drained), in which case any remaining nodes are still owned by
        // this stack and must be freed here.
        let mut cursor = *self.head.get_mut();
        while !cursor.is_null() && cursor != tombstone::<V>() {
            let node = unsafe { Box::from_raw(cursor) };
            cursor = node.next.load(Ordering::Relaxed);
        }
    }
}

/// Runs `task`, catching and logging a panic instead of letting it corrupt
/// the dispatch loop or propagate across unrelated listeners. Genuine
/// aborts (a double panic, an explicit `abort()`) are not unwinding panics
/// and are not caught: only ordinary panics are the Rust analogue of "a
/// listener throws an exception".
pub(crate) fn run_listener(task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let message = panic_message(&payload);
        warn!(panic = %message, "listener panicked during FutureCell completion dispatch");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Dispatches `task` onto `executor`, catching and logging anything
/// `execute` itself does wrong instead of letting it corrupt the caller's
/// own dispatch loop.
pub(crate) fn dispatch(executor: &Arc<dyn Executor>, task: Task) {
    let executor = Arc::clone(executor);
    let result = panic::catch_unwind(AssertUnwindSafe(move || {
        executor.execute(Box::new(move || run_listener(task)));
    }));
    if let Err(payload) = result {
        let message = panic_message(&payload);
        warn!(panic = %message, "executor rejected a FutureCell listener");
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectExecutor, Entry, ListenerStack};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn push_then_drain_runs_in_insertion_order() {
        let stack: ListenerStack<()> = ListenerStack::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            stack
                .push(Entry::User(
                    Box::new(move || order.lock().unwrap().push(i)),
                    Arc::new(DirectExecutor),
                ))
                .ok()
                .unwrap();
        }
        for entry in stack.drain() {
            match entry {
                Entry::User(task, executor) => super::dispatch(&executor, task),
                Entry::Adapter(_) => unreachable!(),
            }
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn push_after_drain_is_rejected() {
        let stack: ListenerStack<()> = ListenerStack::new();
        stack.drain();
        let result = stack.push(Entry::User(Box::new(|| {}), Arc::new(DirectExecutor)));
        assert!(result.is_err());
    }

    #[test]
    fn panicking_listener_does_not_stop_the_rest() {
        let stack: ListenerStack<()> = ListenerStack::new();
        let ran = Arc::new(AtomicUsize::new(0));
        stack
            .push(Entry::User(Box::new(|| panic!("boom")), Arc::new(DirectExecutor)))
            .ok()
            .unwrap();
        let ran2 = ran.clone();
        stack
            .push(Entry::User(
                Box::new(move || {
                    ran2.fetch_add(1, Ordering::SeqCst);
                }),
                Arc::new(DirectExecutor),
            ))
            .ok()
            .unwrap();
        for entry in stack.drain() {
            match entry {
                Entry::User(task, executor) => super::dispatch(&executor, task),
                Entry::Adapter(_) => unreachable!(),
            }
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
