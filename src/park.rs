//! A thread parking primitive independent of `std::thread::park`/`unpark`.
//!
//! `std::thread::park` ties the permit to "the calling thread", which is
//! awkward once a single logical wait (a [`FutureCell`](crate::cell::FutureCell)
//! waiter node) needs to be unparked by a thread other than the one that
//! created it and outlives that thread's stack frame on the lazy-removal
//! timeout path. `Parker` instead owns its own permit, so any holder of a
//! clone (or an `Arc`) can unpark it.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermitState {
    Empty,
    Notified,
}

/// A single-permit parker. Multiple [`park`](Parker::park) calls from the
/// same logical waiter are not meaningful (this type is not reentrant); it
/// is meant to be created once per blocking wait and unparked at most once.
#[derive(Debug, Clone)]
pub struct Parker {
    inner: std::sync::Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<PermitState>,
    condvar: Condvar,
}

impl Default for Parker {
    fn default() -> Self {
        Self::new()
    }
}

impl Parker {
    /// Creates a new parker with no pending permit.
    pub fn new() -> Self {
        Self {
            inner: std::sync::Arc::new(Inner {
                state: Mutex::new(PermitState::Empty),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Blocks the calling thread until [`unpark`](Parker::unpark) is called,
    /// consuming the permit. Returns immediately if a permit is already
    /// available (so `unpark` followed by `park` never blocks).
    ///
    /// May return spuriously; callers that need a specific condition must
    /// re-check it themselves.
    pub fn park(&self) {
        let mut state = self.inner.state.lock();
        if *state == PermitState::Notified {
            *state = PermitState::Empty;
            return;
        }
        self.inner.condvar.wait(&mut state);
        if *state == PermitState::Notified {
            *state = PermitState::Empty;
        }
    }

    /// Like [`park`](Parker::park), but gives up and returns `false` once
    /// `timeout` has elapsed without a permit arriving. Clamped internally
    /// so that absurdly large timeouts (beyond what the platform condvar
    /// wait accepts) cannot overflow.
    pub fn park_timeout(&self, timeout: Duration) -> bool {
        const MAX_WAIT: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 50);
        let timeout = if timeout > MAX_WAIT { MAX_WAIT } else { timeout };

        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if *state == PermitState::Notified {
                *state = PermitState::Empty;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let result = self.inner.condvar.wait_for(&mut state, deadline - now);
            if result.timed_out() && *state != PermitState::Notified {
                return false;
            }
        }
    }

    /// Makes a permit available, waking a thread blocked in `park`/
    /// `park_timeout` (or the next call to either, if none is blocked yet).
    /// Idempotent: unparking a parker that already holds a permit, or one
    /// nobody is waiting on, is a harmless no-op.
    pub fn unpark(&self) {
        let mut state = self.inner.state.lock();
        *state = PermitState::Notified;
        self.inner.condvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::Parker;
    use std::time::Duration;

    #[test]
    fn unpark_before_park_is_not_lost() {
        let parker = Parker::new();
        parker.unpark();
        parker.park();
    }

    #[test]
    fn park_timeout_expires_without_unpark() {
        let parker = Parker::new();
        assert!(!parker.park_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn unpark_wakes_blocked_thread() {
        let parker = Parker::new();
        let other = parker.clone();
        let handle = std::thread::spawn(move || other.park());
        std::thread::sleep(Duration::from_millis(10));
        parker.unpark();
        handle.join().unwrap();
    }
}
