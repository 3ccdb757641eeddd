//! Lock-free listenable futures for the engine task system.
//!
//! [`FutureCell`] is a single-assignment cell: it completes with a value, a
//! failure, or a cancellation exactly once, lets any number of listeners
//! attach before or after that happens, can block a reader (untimed, timed,
//! or against an explicit [`InterruptToken`]), and can delegate its outcome
//! to another cell, including through chains of unbounded depth, completed
//! in O(1) additional stack regardless of chain length.
//!
//! High-level combinators (map, catch, join/select, timeout wrappers),
//! thread pools, and executor lifecycle management are deliberately out of
//! scope: they are external collaborators that consume only the contract
//! published here (`set`/`set_failure`/`cancel`/`delegate_to`/`add_listener`/
//! `get`).
//!
//! ```
//! use game_tasks::{DirectExecutor, FutureCell};
//! use std::sync::Arc;
//!
//! let cell: FutureCell<&'static str> = FutureCell::new();
//! cell.add_listener(|| {}, Arc::new(DirectExecutor));
//! cell.set("done");
//! assert_eq!(cell.get().unwrap(), "done");
//! ```

pub mod cell;
pub mod error;
pub mod future_impl;
pub mod interrupt;
pub mod park;
pub mod sequencer;
pub mod state;

mod listeners;
mod render;
mod waiters;

pub use cell::FutureCell;
pub use error::{DelegationInconsistent, ReadError};
pub use future_impl::Listen;
pub use interrupt::InterruptToken;
pub use listeners::{DirectExecutor, Executor};
pub use sequencer::ExecutionSequencer;
pub use state::{Cause, Outcome};
