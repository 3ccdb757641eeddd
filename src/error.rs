//! The error taxonomy a blocking or async read of a
//! [`FutureCell`](crate::cell::FutureCell) can surface.

use thiserror::Error;

use crate::state::Cause;

/// Why a delegation's transcribed outcome was rejected as inconsistent.
#[derive(Debug, Error)]
#[error("upstream future reported cancellation but yielded a value")]
pub struct DelegationInconsistent;

/// The error surfaced by [`FutureCell::get`](crate::cell::FutureCell::get),
/// [`FutureCell::get_timeout`](crate::cell::FutureCell::get_timeout), and the
/// async adapter in [`future_impl`](crate::future_impl).
///
/// The execution failure is always a type-erased [`Cause`]: a producer hands
/// `set_failure` any `E: std::error::Error + Send + Sync + 'static`, and the
/// cell stores it behind the same erased representation a cancellation's
/// optional cause uses, so both arms of this enum carry the same kind of
/// payload.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The cell completed with a producer-supplied failure.
    #[error("future failed")]
    Execution(#[source] Cause),
    /// The cell was cancelled, possibly as a result of delegation.
    #[error("future was cancelled")]
    Cancelled {
        /// Whether cancellation also requested interruption of the
        /// computation. Never crosses a delegation boundary.
        interrupted: bool,
        /// Optional cause attached to the cancellation.
        #[source]
        cause: Option<Cause>,
    },
    /// A `get(timeout)` call's deadline expired before the cell completed.
    /// The cell itself is unaffected and remains pending.
    #[error("timed out waiting for future to complete")]
    Timeout,
    /// The blocking reader's thread received an interrupt while parked.
    /// The cell itself is unaffected.
    #[error("interrupted while waiting for future to complete")]
    Interrupted,
}

impl ReadError {
    /// `true` for [`ReadError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReadError::Cancelled { .. })
    }

    /// `true` for [`ReadError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, ReadError::Timeout)
    }

    /// `true` for [`ReadError::Cancelled`] with `interrupted: true`.
    pub fn was_interrupted(&self) -> bool {
        matches!(self, ReadError::Cancelled { interrupted: true, .. })
    }
}
