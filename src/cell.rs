//! `FutureCell<V>`: the listenable future primitive.
//!
//! A cell moves through at most the transitions `Pending -> Done`,
//! `Pending -> Delegating -> Done`, or is claimed transiently by `Writing`
//! in between. Every producer operation (`set`, `set_failure`, `cancel`,
//! `delegate_to`) funnels through [`FutureCell::try_complete`], the single
//! compare-exchange that decides, once and for all, which call wins.
//! Everything after that CAS (releasing waiters, running hooks, dispatching
//! listeners, unwinding a delegation chain) is [`drive`], which processes an
//! explicit work queue instead of recursing, so a chain of any depth
//! completes in O(1) additional stack.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::ReadError;
use crate::interrupt::InterruptToken;
use crate::listeners::{dispatch, run_listener, Entry, Executor, ListenerStack};
use crate::park::Parker;
use crate::state::{Cause, Outcome, Tag};
use crate::waiters::WaiterStack;

type Hook = Box<dyn FnOnce() + Send>;

struct Inner<V> {
    tag: AtomicU8,
    slot: UnsafeCell<MaybeUninit<Outcome<V>>>,
    /// The upstream this cell delegated to, if any; cleared as soon as this
    /// cell adopts a terminal outcome so a long delegation chain releases
    /// its upstream references incrementally rather than only when the
    /// downstream-most cell is finally dropped.
    upstream: Mutex<Option<FutureCell<V>>>,
    listeners: ListenerStack<V>,
    waiters: WaiterStack,
    done_hook: Mutex<Option<Hook>>,
    interrupt_hook: Mutex<Option<Hook>>,
}

// SAFETY: `Inner<V>` is shared across threads only through `Arc`; every
// field is either itself thread-safe (`AtomicU8`, the `parking_lot` types)
// or the `UnsafeCell` slot, which is written at most once, by exactly the
// thread whose compare-exchange claims `Tag::Writing`, and only ever read
// afterward (`Ordering::Acquire` on a load that observed `Tag::Done`, which
// happens-after the writer's `Ordering::Release` store).
unsafe impl<V: Send> Send for Inner<V> {}
unsafe impl<V: Send + Sync> Sync for Inner<V> {}

impl<V> Drop for Inner<V> {
    fn drop(&mut self) {
        if *self.tag.get_mut() == Tag::Done.as_u8() {
            // SAFETY: `tag == Done` means the slot was initialized by
            // `try_complete`'s writer and never since touched.
            unsafe {
                std::ptr::drop_in_place((*self.slot.get()).as_mut_ptr());
            }
        }
    }
}

/// A lock-free, single-assignment cell that any number of observers can
/// block on or attach listeners to, and that one cell may delegate its
/// outcome to another.
///
/// Cheaply `Clone`: every handle shares the same backing state through an
/// `Arc`. `V` must be `Clone` because `get` can be called any number of
/// times and must hand back an owned value on each call, and because
/// transcribing a delegated outcome into a downstream cell copies it rather
/// than moving it out of the upstream cell it still lives in (the same
/// requirement `futures::future::Shared` places on its output).
pub struct FutureCell<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for FutureCell<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for FutureCell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureCell")
            .field("tag", &Tag::from_u8(self.inner.tag.load(Ordering::Relaxed)))
            .finish_non_exhaustive()
    }
}

impl<V> Default for FutureCell<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FutureCell<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new, pending cell with empty listener and waiter stacks.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tag: AtomicU8::new(Tag::Pending.as_u8()),
                slot: UnsafeCell::new(MaybeUninit::uninit()),
                upstream: Mutex::new(None),
                listeners: ListenerStack::new(),
                waiters: WaiterStack::new(),
                done_hook: Mutex::new(None),
                interrupt_hook: Mutex::new(None),
            }),
        }
    }

    // --- producer-facing operations ---------------------------------------

    /// Completes the cell with `value`. Returns `false` if the cell was
    /// already terminal or delegating and some other call won the race.
    pub fn set(&self, value: V) -> bool {
        match self.try_complete(Outcome::Ok(value)) {
            Some(_) => {
                drive(Arc::clone(&self.inner), false);
                true
            }
            None => false,
        }
    }

    /// Completes the cell with a failure. `err` is stored type-erased
    /// behind [`Cause`]; callers that already hold a [`Cause`] (for
    /// instance one obtained from another `FutureCell`) can pass it through
    /// `set_failure_cause` instead of re-wrapping it.
    pub fn set_failure<E>(&self, err: E) -> bool
    where
        E: StdError + Send + Sync + 'static,
    {
        let cause: Cause = Arc::new(err);
        self.set_failure_cause(cause)
    }

    /// As [`set_failure`](FutureCell::set_failure), taking an already type-erased cause.
    pub fn set_failure_cause(&self, cause: Cause) -> bool {
        match self.try_complete(Outcome::Fail(cause)) {
            Some(_) => {
                drive(Arc::clone(&self.inner), false);
                true
            }
            None => false,
        }
    }

    /// Cancels the cell. If `interrupt` is `true`, the interrupt hook (if
    /// any) runs as part of completion. If the cell was delegating, the
    /// upstream is best-effort cancelled too (always without requesting its
    /// own interrupt hook, since interruption never crosses a delegation
    /// boundary).
    pub fn cancel(&self, interrupt: bool) -> bool {
        self.cancel_with(Outcome::Cancel {
            interrupted: interrupt,
            cause: None,
        })
    }

    /// As [`cancel`](FutureCell::cancel), attaching a human-readable cause.
    pub fn cancel_with_cause<E>(&self, interrupt: bool, cause: E) -> bool
    where
        E: StdError + Send + Sync + 'static,
    {
        let cause: Cause = Arc::new(cause);
        self.cancel_with(Outcome::Cancel {
            interrupted: interrupt,
            cause: Some(cause),
        })
    }

    fn cancel_with(&self, outcome: Outcome<V>) -> bool {
        let interrupt = outcome.was_interrupted();
        match self.try_complete(outcome) {
            Some(prev) => {
                drive(Arc::clone(&self.inner), interrupt);
                if prev == Tag::Delegating {
                    if let Some(upstream) = self.inner.upstream.lock().take() {
                        propagate_cancel_upstream(upstream);
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Binds this cell's outcome to `upstream`'s. Returns
    /// `false` if this cell was already terminal or delegating; if the
    /// surviving state is a cancellation, the cancel is best-effort
    /// propagated to `upstream` even though this call returns `false`.
    pub fn delegate_to(&self, upstream: FutureCell<V>) -> bool {
        if let Some(outcome) = upstream.try_peek() {
            let transcribed = outcome.clone().transcribe();
            return match self.try_complete(transcribed) {
                Some(_) => {
                    drive(Arc::clone(&self.inner), false);
                    true
                }
                None => false,
            };
        }

        match self.inner.tag.compare_exchange(
            Tag::Pending.as_u8(),
            Tag::Delegating.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                *self.inner.upstream.lock() = Some(upstream.clone());
                match upstream.inner.listeners.push(Entry::Adapter(self.clone())) {
                    Ok(()) => {}
                    Err(_) => {
                        // `upstream` completed between our `try_peek` above
                        // and this push; finish the transcription ourselves
                        // instead of leaving an adapter that will never
                        // fire.
                        self.resolve_delegation_immediately(&upstream);
                    }
                }
                true
            }
            Err(_) => {
                if self.is_cancelled() {
                    upstream.cancel(false);
                }
                false
            }
        }
    }

    /// Completes `self` from `upstream`'s already-terminal outcome when the
    /// adapter listener lost the race to register. Called with `self` known
    /// to still be `Delegating` (we just installed it and no other producer
    /// call can have touched it yet except a concurrent `cancel`, which the
    /// CAS below loses to gracefully).
    fn resolve_delegation_immediately(&self, upstream: &FutureCell<V>) {
        let outcome = match upstream.try_peek() {
            Some(outcome) => outcome.clone().transcribe(),
            None => return, // lost a further race; the adapter path, if any, will handle it
        };
        if self
            .inner
            .tag
            .compare_exchange(
                Tag::Delegating.as_u8(),
                Tag::Writing.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            // SAFETY: we just won the claim above; we are the sole writer.
            unsafe {
                (*self.inner.slot.get()).write(outcome);
            }
            self.inner.tag.store(Tag::Done.as_u8(), Ordering::Release);
            self.inner.upstream.lock().take();
            drive(Arc::clone(&self.inner), false);
        }
    }

    /// `true` once the cell holds a terminal outcome (not `Pending`, not
    /// `Delegating`).
    pub fn is_done(&self) -> bool {
        self.try_peek().is_some()
    }

    /// `true` if the terminal outcome is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.try_peek().is_some_and(Outcome::is_cancel)
    }

    /// `true` if the terminal outcome is a cancellation that requested
    /// interruption.
    pub fn was_interrupted(&self) -> bool {
        self.try_peek().is_some_and(Outcome::was_interrupted)
    }

    /// Registers a user override invoked exactly once, after completion and
    /// before the interrupt hook and listeners, only on a cancel with
    /// `interrupt = true`. No-op if the cell is
    /// already terminal.
    pub fn set_interrupt_hook<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.inner.interrupt_hook.lock() = Some(Box::new(hook));
    }

    /// Registers a user override invoked exactly once after completion and
    /// before listeners are dispatched. No-op if the
    /// cell is already terminal.
    pub fn set_done_hook<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.inner.done_hook.lock() = Some(Box::new(hook));
    }

    // --- consumer-facing operations ----------------------------------------

    /// Registers `task` to run on `executor` once the cell completes. If
    /// the cell is already terminal, `task` runs immediately, before this
    /// call returns (modulo `executor`'s own semantics).
    pub fn add_listener<F>(&self, task: F, executor: Arc<dyn Executor>)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.inner.listeners.push(Entry::User(Box::new(task), executor)) {
            Ok(()) => {}
            Err(Entry::User(task, executor)) => dispatch(&executor, task),
            Err(Entry::Adapter(_)) => {
                unreachable!("add_listener only ever pushes Entry::User")
            }
        }
    }

    /// Blocks the calling thread until the cell completes, then decodes the
    /// outcome.
    pub fn get(&self) -> Result<V, ReadError> {
        loop {
            if let Some(outcome) = self.try_peek() {
                return decode(outcome);
            }
            let parker = Parker::new();
            if self.inner.waiters.push(&parker) {
                parker.park();
            }
        }
    }

    /// As [`get`](FutureCell::get), giving up with [`ReadError::Timeout`]
    /// once `timeout` elapses without the cell completing. The cell itself
    /// is unaffected by a timeout and remains pending.
    pub fn get_timeout(&self, timeout: Duration) -> Result<V, ReadError> {
        let start = Instant::now();
        loop {
            if let Some(outcome) = self.try_peek() {
                return decode(outcome);
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(ReadError::Timeout);
            }
            let parker = Parker::new();
            if self.inner.waiters.push(&parker) {
                if !parker.park_timeout(remaining) {
                    // Lazy removal: the stale node is left in the waiter
                    // stack and harmlessly unparked later.
                    return match self.try_peek() {
                        Some(outcome) => decode(outcome),
                        None => Err(ReadError::Timeout),
                    };
                }
            }
        }
    }

    /// As [`get`](FutureCell::get), but also returns
    /// [`ReadError::Interrupted`] if `token` is interrupted while blocked.
    /// The cell itself is unaffected.
    pub fn get_interruptible(&self, token: &InterruptToken) -> Result<V, ReadError> {
        loop {
            if let Some(outcome) = self.try_peek() {
                return decode(outcome);
            }
            if token.is_interrupted() {
                return Err(ReadError::Interrupted);
            }
            if self.inner.waiters.push(token.parker()) {
                token.parker().park();
            }
            if token.is_interrupted() && self.try_peek().is_none() {
                return Err(ReadError::Interrupted);
            }
        }
    }

    /// Non-blocking decode used by the async adapter in
    /// [`future_impl`](crate::future_impl): `Some` once terminal, `None`
    /// while pending or delegating.
    pub(crate) fn peek_decoded(&self) -> Option<Result<V, ReadError>> {
        self.try_peek().map(decode)
    }

    /// Reads the terminal outcome without blocking, spinning through the
    /// brief transient window between a producer's claim and its publish
    /// (`Tag::Writing`, not a meaningful state of its own). Returns `None`
    /// while `Pending` or `Delegating`.
    pub(crate) fn try_peek(&self) -> Option<&Outcome<V>> {
        loop {
            let tag = self.inner.tag.load(Ordering::Acquire);
            if tag == Tag::Done.as_u8() {
                // SAFETY: `Acquire` here happens-after the writer's
                // `Release` store of `Tag::Done`, which itself happens-after
                // the write into `slot`.
                return Some(unsafe { &*(*self.inner.slot.get()).as_ptr() });
            }
            if tag == Tag::Writing.as_u8() {
                std::hint::spin_loop();
                continue;
            }
            return None;
        }
    }

    /// Attempts the single completion compare-exchange. Claims `Tag::Writing`
    /// from whichever of `Pending`/`Delegating` is
    /// currently observed, writes `outcome`, then publishes `Tag::Done`
    /// with a `Release` store. Returns the tag that was current just before
    /// this call won, or `None` if the cell was already `Writing` or `Done`.
    fn try_complete(&self, outcome: Outcome<V>) -> Option<Tag> {
        loop {
            let current = self.inner.tag.load(Ordering::Acquire);
            if current != Tag::Pending.as_u8() && current != Tag::Delegating.as_u8() {
                return None;
            }
            match self.inner.tag.compare_exchange(
                current,
                Tag::Writing.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // SAFETY: we just won the only compare-exchange that
                    // can ever claim `Writing` from this value; no other
                    // thread touches `slot` until we publish `Done` below.
                    unsafe {
                        (*self.inner.slot.get()).write(outcome);
                    }
                    self.inner.tag.store(Tag::Done.as_u8(), Ordering::Release);
                    return Some(Tag::from_u8(current));
                }
                Err(_) => continue,
            }
        }
    }

    /// Exposes this cell's `Arc`-backed identity for render cycle detection,
    /// without requiring `V: PartialEq`.
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn tag(&self) -> Tag {
        Tag::from_u8(self.inner.tag.load(Ordering::Relaxed))
    }

    pub(crate) fn upstream_snapshot(&self) -> Option<FutureCell<V>> {
        self.inner.upstream.lock().clone()
    }
}

fn decode<V: Clone>(outcome: &Outcome<V>) -> Result<V, ReadError> {
    match outcome {
        Outcome::Ok(v) => Ok(v.clone()),
        Outcome::Fail(cause) => Err(ReadError::Execution(Arc::clone(cause))),
        Outcome::Cancel { interrupted, cause } => Err(ReadError::Cancelled {
            interrupted: *interrupted,
            cause: cause.clone(),
        }),
    }
}

/// The completion engine, run once per producer call that wins
/// `try_complete`, starting from the cell that call completed.
///
/// Processes an explicit FIFO of `(cell, call_interrupt_hook)` pairs instead
/// of recursing: when draining listeners turns up a delegation adapter
/// bound to a downstream cell, that downstream cell is completed in place
/// (its tag CAS'd straight from `Delegating` to `Writing` to `Done`, the same
/// transition `try_complete` performs, just without going through a second
/// `FutureCell` method call) and pushed onto the same queue rather than
/// driven by a nested call to `drive`. A delegation chain of any depth is
/// therefore one `drive` call with a queue that never recurses.
fn drive<V>(start: Arc<Inner<V>>, call_interrupt_hook: bool)
where
    V: Clone + Send + Sync + 'static,
{
    let mut queue: VecDeque<(Arc<Inner<V>>, bool)> = VecDeque::new();
    queue.push_back((start, call_interrupt_hook));

    while let Some((inner, call_interrupt_hook)) = queue.pop_front() {
        inner.waiters.release();

        if call_interrupt_hook {
            if let Some(hook) = inner.interrupt_hook.lock().take() {
                run_listener(hook);
            }
        }
        if let Some(hook) = inner.done_hook.lock().take() {
            run_listener(hook);
        }

        for entry in inner.listeners.drain() {
            match entry {
                Entry::User(task, executor) => dispatch(&executor, task),
                Entry::Adapter(downstream) => {
                    // SAFETY: `inner` is `Done` by the time its listeners
                    // are drained (`try_complete` publishes `Done` before
                    // `drive` is ever invoked on it).
                    let outcome = unsafe { &*(*inner.slot.get()).as_ptr() }
                        .clone()
                        .transcribe();
                    match downstream.inner.tag.compare_exchange(
                        Tag::Delegating.as_u8(),
                        Tag::Writing.as_u8(),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            // SAFETY: we just won the claim above.
                            unsafe {
                                (*downstream.inner.slot.get()).write(outcome);
                            }
                            downstream
                                .inner
                                .tag
                                .store(Tag::Done.as_u8(), Ordering::Release);
                            downstream.inner.upstream.lock().take();
                            // Interruption never crosses a delegation
                            // boundary (`transcribe` already stripped it),
                            // so the downstream's own hooks never run with
                            // `call_interrupt_hook = true` on our account.
                            queue.push_back((Arc::clone(&downstream.inner), false));
                        }
                        Err(_) => {
                            // `downstream` completed independently (e.g. a
                            // racing direct cancel) before this adapter
                            // fired; nothing left to publish.
                        }
                    }
                }
            }
        }
    }
}

/// Best-effort cancel propagation up a delegation chain. Walks
/// upstream-of-upstream directly via the tag CAS instead of recursing
/// through `cancel`, so cancelling the downstream end of an N-deep chain
/// costs O(1) stack just like completing it does.
fn propagate_cancel_upstream<V>(mut upstream: FutureCell<V>)
where
    V: Clone + Send + Sync + 'static,
{
    loop {
        match upstream.try_complete(Outcome::Cancel {
            interrupted: false,
            cause: None,
        }) {
            Some(prev) => {
                drive(Arc::clone(&upstream.inner), false);
                if prev != Tag::Delegating {
                    return;
                }
                match upstream.inner.upstream.lock().take() {
                    Some(next) => upstream = next,
                    None => return,
                }
            }
            None => return, // already terminal independently; nothing to propagate further
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::DirectExecutor;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Barrier;
    use std::thread;

    fn direct() -> Arc<dyn Executor> {
        Arc::new(DirectExecutor)
    }

    #[test]
    fn set_then_get_round_trips() {
        let cell: FutureCell<i32> = FutureCell::new();
        assert!(cell.set(42));
        assert_eq!(cell.get().unwrap(), 42);
        assert!(cell.is_done());
        assert!(!cell.is_cancelled());
    }

    #[test]
    fn second_set_loses() {
        let cell: FutureCell<i32> = FutureCell::new();
        assert!(cell.set(1));
        assert!(!cell.set(2));
        assert_eq!(cell.get().unwrap(), 1);
    }

    #[test]
    fn set_failure_surfaces_execution_error() {
        #[derive(Debug, thiserror::Error)]
        #[error("boom")]
        struct Boom;

        let cell: FutureCell<i32> = FutureCell::new();
        assert!(cell.set_failure(Boom));
        let err = cell.get().unwrap_err();
        assert!(matches!(err, ReadError::Execution(_)));
    }

    #[test]
    fn cancel_then_set_loses_race() {
        let cell: FutureCell<i32> = FutureCell::new();
        assert!(cell.cancel(true));
        assert!(!cell.set(7));
        let err = cell.get().unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.was_interrupted());
    }

    #[test]
    fn racing_set_exactly_one_wins() {
        let cell: FutureCell<i32> = FutureCell::new();
        let barrier = Arc::new(Barrier::new(2));
        let wins = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = [1, 2]
            .into_iter()
            .map(|v| {
                let cell = cell.clone();
                let barrier = barrier.clone();
                let wins = wins.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if cell.set(v) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert!(cell.get().is_ok());
    }

    #[test]
    fn listener_added_before_completion_runs() {
        let cell: FutureCell<i32> = FutureCell::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        cell.add_listener(move || ran2.store(true, Ordering::SeqCst), direct());
        assert!(cell.set(1));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn listener_added_after_completion_runs_immediately() {
        let cell: FutureCell<i32> = FutureCell::new();
        assert!(cell.set(1));
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        cell.add_listener(move || ran2.store(true, Ordering::SeqCst), direct());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn delegate_to_pending_upstream_transcribes_on_completion() {
        let upstream: FutureCell<i32> = FutureCell::new();
        let downstream: FutureCell<i32> = FutureCell::new();
        assert!(downstream.delegate_to(upstream.clone()));
        assert!(!downstream.is_done());
        assert!(upstream.set(9));
        assert_eq!(downstream.get().unwrap(), 9);
    }

    #[test]
    fn delegate_to_already_done_upstream_completes_immediately() {
        let upstream: FutureCell<i32> = FutureCell::new();
        upstream.set(5);
        let downstream: FutureCell<i32> = FutureCell::new();
        assert!(downstream.delegate_to(upstream));
        assert_eq!(downstream.get().unwrap(), 5);
    }

    #[test]
    fn interruption_does_not_cross_delegation_boundary() {
        let upstream: FutureCell<i32> = FutureCell::new();
        let downstream: FutureCell<i32> = FutureCell::new();
        assert!(downstream.delegate_to(upstream.clone()));
        assert!(upstream.cancel(true));
        let err = downstream.get().unwrap_err();
        assert!(err.is_cancelled());
        assert!(!err.was_interrupted());
    }

    #[test]
    fn long_delegation_chain_completes_without_overflowing_the_stack() {
        const N: usize = 10_000;
        let cells: Vec<FutureCell<i32>> = (0..=N).map(|_| FutureCell::new()).collect();
        for i in 0..N {
            assert!(cells[i].delegate_to(cells[i + 1].clone()));
        }
        assert!(cells[N].set(42));
        assert_eq!(cells[0].get().unwrap(), 42);
        assert!(cells[N / 2].get().unwrap() == 42);
    }

    #[test]
    fn cancel_during_delegation_propagates_upstream_best_effort() {
        let upstream: FutureCell<i32> = FutureCell::new();
        let downstream: FutureCell<i32> = FutureCell::new();
        assert!(downstream.delegate_to(upstream.clone()));
        assert!(downstream.cancel(false));
        assert!(upstream.is_cancelled());
    }

    #[test]
    fn timed_wait_crosses_completion() {
        let cell: FutureCell<i32> = FutureCell::new();
        let cell2 = cell.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cell2.set(99);
        });
        let result = cell.get_timeout(Duration::from_millis(500));
        handle.join().unwrap();
        assert_eq!(result.unwrap(), 99);
    }

    #[test]
    fn timed_wait_times_out_and_cell_remains_pending() {
        let cell: FutureCell<i32> = FutureCell::new();
        let result = cell.get_timeout(Duration::from_millis(20));
        assert!(matches!(result, Err(ReadError::Timeout)));
        assert!(!cell.is_done());
    }

    #[test]
    fn panicking_listener_does_not_stop_completion_or_other_listeners() {
        let cell: FutureCell<i32> = FutureCell::new();
        let ran = Arc::new(AtomicBool::new(false));
        cell.add_listener(|| panic!("listener blew up"), direct());
        let ran2 = ran.clone();
        cell.add_listener(move || ran2.store(true, Ordering::SeqCst), direct());
        assert!(cell.set(1));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn done_hook_runs_before_listeners() {
        let cell: FutureCell<i32> = FutureCell::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order2 = order.clone();
        cell.set_done_hook(move || order2.lock().push("hook"));
        let order3 = order.clone();
        cell.add_listener(move || order3.lock().push("listener"), direct());
        cell.set(1);
        assert_eq!(*order.lock(), vec!["hook", "listener"]);
    }

    #[test]
    fn interrupt_hook_runs_only_on_interrupting_cancel() {
        let cell: FutureCell<i32> = FutureCell::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        cell.set_interrupt_hook(move || ran2.store(true, Ordering::SeqCst));
        cell.cancel(false);
        assert!(!ran.load(Ordering::SeqCst));

        let cell: FutureCell<i32> = FutureCell::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        cell.set_interrupt_hook(move || ran2.store(true, Ordering::SeqCst));
        cell.cancel(true);
        assert!(ran.load(Ordering::SeqCst));
    }
}
