//! An `impl Future` adapter over [`FutureCell`], built entirely on top of
//! the published listener contract. Adds no new state transition and does
//! not change `is_done`/`get`/`add_listener` semantics; deleting this
//! module leaves the core fully functional.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use atomic_waker::AtomicWaker;
use futures_core::future::{FusedFuture, Future};

use crate::cell::FutureCell;
use crate::error::ReadError;
use crate::listeners::DirectExecutor;

impl<V> FutureCell<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Returns a `Future`/`FusedFuture` resolving to this cell's decoded
    /// outcome. Multiple calls, and the handle itself, may be polled from
    /// different tasks; each polls the same underlying cell independently.
    pub fn listen(&self) -> Listen<V> {
        Listen {
            cell: self.clone(),
            waker: Arc::new(AtomicWaker::new()),
            listening: false,
        }
    }
}

/// A `Future` over a [`FutureCell`]'s eventual outcome, obtained from
/// [`FutureCell::listen`].
pub struct Listen<V> {
    cell: FutureCell<V>,
    waker: Arc<AtomicWaker>,
    listening: bool,
}

impl<V> Future for Listen<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = Result<V, ReadError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(result) = this.cell.peek_decoded() {
            return Poll::Ready(result);
        }

        this.waker.register(cx.waker());

        if !this.listening {
            this.listening = true;
            let waker = Arc::clone(&this.waker);
            // `add_listener` itself resolves the completed-vs-pending race:
            // either the cell is already done and this listener
            // runs `waker.wake()` synchronously right here, or it is queued
            // and the completion engine fires it exactly once later. Either
            // way the registered waker above is never left dangling.
            this.cell
                .add_listener(move || waker.wake(), Arc::new(DirectExecutor));
        }

        match this.cell.peek_decoded() {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}

impl<V> FusedFuture for Listen<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn is_terminated(&self) -> bool {
        self.cell.is_done()
    }
}
