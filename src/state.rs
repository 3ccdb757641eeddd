//! The terminal outcome of a [`FutureCell`](crate::cell::FutureCell) and the
//! tag that guards it.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// A type-erased, `Send + Sync` failure value.
///
/// Boxed behind an `Arc` rather than a plain `Box` so that the same cause can
/// be cheaply shared by a [`Outcome::Cancel`] that is transcribed across a
/// delegation chain without cloning the underlying error.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// The irrevocable outcome of a [`FutureCell`](crate::cell::FutureCell).
///
/// `V` may legitimately be a type whose "no value" representation (`None`,
/// `()`, a null pointer wrapper, ...) is a normal, successful outcome; that
/// is orthogonal to whether the cell has completed at all, which is exactly
/// why this is a three-armed enum rather than `Option<Result<V, Cause>>`.
pub enum Outcome<V> {
    /// Completed successfully with `v`.
    Ok(V),
    /// Completed with a producer-supplied failure.
    Fail(Cause),
    /// Completed via cancellation.
    Cancel {
        /// Distinguishes cooperative cancellation from one that also asked
        /// the running computation to be interrupted.
        interrupted: bool,
        /// Optional human-readable cause, lazily attached by the caller.
        cause: Option<Cause>,
    },
}

impl<V> Outcome<V> {
    pub(crate) fn is_cancel(&self) -> bool {
        matches!(self, Outcome::Cancel { .. })
    }

    pub(crate) fn was_interrupted(&self) -> bool {
        matches!(self, Outcome::Cancel { interrupted: true, .. })
    }

    /// Transcribes this outcome into the outcome a delegating downstream
    /// cell should adopt. Interruption never crosses the boundary.
    pub(crate) fn transcribe(self) -> Outcome<V> {
        match self {
            Outcome::Ok(v) => Outcome::Ok(v),
            Outcome::Fail(e) => Outcome::Fail(e),
            Outcome::Cancel { cause, .. } => Outcome::Cancel {
                interrupted: false,
                cause,
            },
        }
    }
}

impl<V> Clone for Outcome<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Outcome::Ok(v) => Outcome::Ok(v.clone()),
            Outcome::Fail(e) => Outcome::Fail(Arc::clone(e)),
            Outcome::Cancel { interrupted, cause } => Outcome::Cancel {
                interrupted: *interrupted,
                cause: cause.clone(),
            },
        }
    }
}

impl<V> fmt::Debug for Outcome<V>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ok(v) => f.debug_tuple("Ok").field(v).finish(),
            Outcome::Fail(e) => f.debug_tuple("Fail").field(&e.to_string()).finish(),
            Outcome::Cancel { interrupted, cause } => f
                .debug_struct("Cancel")
                .field("interrupted", interrupted)
                .field("cause", &cause.as_ref().map(|c| c.to_string()))
                .finish(),
        }
    }
}

/// Tag discriminant for the atomic state word. Only ever moves forward:
/// `Pending -> Delegating -> Writing -> Done` or `Pending -> Writing -> Done`,
/// never backward.
///
/// `Writing` is the transient claim a producer holds between winning the
/// completion compare-exchange and publishing the written outcome with a
/// `Release` store; it exists so that two threads racing to complete the
/// same cell can never both write the terminal outcome slot (only one ever
/// transitions *into* `Writing`), while still presenting the rest of the
/// crate with what is, in effect, a single atomic completion CAS. A reader
/// that observes `Writing` spins briefly rather than treating it as a
/// meaningful state of its own; the window between claim and publish does
/// no syscalls and is never held across a lock or a blocking call.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tag {
    Pending = 0,
    Delegating = 1,
    Writing = 2,
    Done = 3,
}

impl Tag {
    #[inline]
    pub(crate) const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => Tag::Pending,
            1 => Tag::Delegating,
            2 => Tag::Writing,
            3 => Tag::Done,
            _ => unreachable!("invalid FutureCell state tag"),
        }
    }
}
