//! An explicit interrupt signal for blocking reads.
//!
//! Java's `Thread.interrupt()` consults a per-thread interrupt flag from
//! inside its park primitive; Rust has no such ambient flag. `InterruptToken`
//! is the explicit stand-in: callers that want an interruptible wait create
//! one, hand a clone to whoever should be able to interrupt it, and pass a
//! reference to [`FutureCell::get_interruptible`](crate::cell::FutureCell::get_interruptible).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::park::Parker;

/// A cloneable, shareable interrupt flag paired with the [`Parker`] a
/// blocking read parks on, so that interrupting the token and completing
/// the cell being waited on both wake the same park call.
#[derive(Debug, Clone)]
pub struct InterruptToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    interrupted: AtomicBool,
    parker: Parker,
}

impl Default for InterruptToken {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                interrupted: AtomicBool::new(false),
                parker: Parker::new(),
            }),
        }
    }

    /// Requests interruption. Idempotent; wakes a thread currently blocked
    /// via [`FutureCell::get_interruptible`](crate::cell::FutureCell::get_interruptible)
    /// with this token, or the next one to block with it.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::Release);
        self.inner.parker.unpark();
    }

    /// `true` once [`interrupt`](InterruptToken::interrupt) has been called.
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::Acquire)
    }

    pub(crate) fn parker(&self) -> &Parker {
        &self.inner.parker
    }
}

#[cfg(test)]
mod tests {
    use super::InterruptToken;
    use std::time::Duration;

    #[test]
    fn interrupt_before_wait_is_observed() {
        let token = InterruptToken::new();
        token.interrupt();
        assert!(token.is_interrupted());
    }

    #[test]
    fn interrupt_wakes_blocked_thread() {
        let token = InterruptToken::new();
        let waiter = token.clone();
        let handle = std::thread::spawn(move || waiter.parker().park());
        std::thread::sleep(Duration::from_millis(10));
        token.interrupt();
        handle.join().unwrap();
    }
}
