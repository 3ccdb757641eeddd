//! An execution sequencer: serializes a chain of submissions onto a single
//! `Executor` without unbounded stack growth when that executor happens to
//! run tasks inline. Independent of [`FutureCell`](crate::cell::FutureCell);
//! it consumes only the [`Executor`] contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::listeners::{dispatch, Executor};

type Task = Box<dyn FnOnce() + Send>;

/// A queue of tasks dispatched one at a time, in submission order, onto a
/// single [`Executor`]. If a task submitted while another is running itself
/// submits to the same sequencer, the new task is appended to the queue
/// rather than dispatched through a nested call, so a chain of N submissions
/// from a direct executor costs O(1) stack instead of O(N), the same
/// property [`drive`](crate::cell) gives delegation chains.
pub struct ExecutionSequencer {
    executor: Arc<dyn Executor>,
    queue: SegQueue<Task>,
    draining: AtomicBool,
}

impl ExecutionSequencer {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            queue: SegQueue::new(),
            draining: AtomicBool::new(false),
        }
    }

    /// Enqueues `task`. Runs it (and any task already queued) on the
    /// calling thread if no other submission is currently draining;
    /// otherwise the current drainer will pick it up.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Box::new(task));
        self.drain_if_idle();
    }

    fn drain_if_idle(&self) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        loop {
            while let Some(task) = self.queue.pop() {
                dispatch(&self.executor, task);
            }
            self.draining.store(false, Ordering::Release);
            if self.queue.is_empty() {
                return;
            }
            // A submission raced in between the queue draining empty and
            // the flag clearing above; reclaim the drainer role rather than
            // stranding that task, unless someone else already did.
            if self
                .draining
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionSequencer;
    use crate::listeners::DirectExecutor;
    use std::sync::{Arc, Mutex};

    #[test]
    fn tasks_run_in_submission_order() {
        let seq = ExecutionSequencer::new(Arc::new(DirectExecutor));
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            seq.submit(move || order.lock().unwrap().push(i));
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn reentrant_submission_does_not_recurse_into_execute() {
        let seq = Arc::new(ExecutionSequencer::new(Arc::new(DirectExecutor)));
        let ran = Arc::new(Mutex::new(Vec::new()));

        let seq2 = Arc::clone(&seq);
        let ran2 = Arc::clone(&ran);
        seq.submit(move || {
            ran2.lock().unwrap().push(1);
            let ran3 = Arc::clone(&ran2);
            seq2.submit(move || ran3.lock().unwrap().push(2));
        });

        assert_eq!(*ran.lock().unwrap(), vec![1, 2]);
    }
}
