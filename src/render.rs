//! Diagnostic string rendering. Never blocks, guards against delegation
//! cycles, absurdly long chains, and a user `V` whose `Debug` impl panics.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::cell::FutureCell;
use crate::state::{Outcome, Tag};

/// A delegation chain deeper than this renders as truncated rather than
/// walking arbitrarily far; real chains this deep (tens of thousands of
/// cells) are expected, but a diagnostic string is not the place to pay for
/// walking all of them.
const MAX_RENDER_DEPTH: usize = 64;

impl<V> fmt::Display for FutureCell<V>
where
    V: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self, f, &mut Vec::new(), 0)
    }
}

fn render<V>(
    cell: &FutureCell<V>,
    f: &mut fmt::Formatter<'_>,
    seen: &mut Vec<FutureCell<V>>,
    depth: usize,
) -> fmt::Result
where
    V: Clone + Send + Sync + fmt::Debug + 'static,
{
    if depth >= MAX_RENDER_DEPTH {
        return write!(f, "<delegation chain truncated at depth {MAX_RENDER_DEPTH}>");
    }
    if seen.iter().any(|seen_cell| seen_cell.ptr_eq(cell)) {
        return write!(f, "<cyclic delegation>");
    }

    if let Some(outcome) = cell.try_peek() {
        return render_outcome(outcome, f);
    }

    match cell.tag() {
        Tag::Delegating => match cell.upstream_snapshot() {
            Some(upstream) => {
                seen.push(cell.clone());
                write!(f, "DELEGATING(")?;
                render(&upstream, f, seen, depth + 1)?;
                write!(f, ")")
            }
            // The upstream reference was just cleared by a concurrent
            // completion; by the time this renders it is effectively done.
            None => write!(f, "DELEGATING(<resolved>)"),
        },
        _ => write!(f, "PENDING"),
    }
}

fn render_outcome<V>(outcome: &Outcome<V>, f: &mut fmt::Formatter<'_>) -> fmt::Result
where
    V: fmt::Debug,
{
    match panic::catch_unwind(AssertUnwindSafe(|| format!("{outcome:?}"))) {
        Ok(text) => f.write_str(&text),
        Err(_) => f.write_str("<value panicked while rendering>"),
    }
}

#[cfg(test)]
mod tests {
    use crate::cell::FutureCell;

    #[test]
    fn pending_renders_as_pending() {
        let cell: FutureCell<i32> = FutureCell::new();
        assert_eq!(format!("{cell}"), "PENDING");
    }

    #[test]
    fn done_renders_the_outcome() {
        let cell: FutureCell<i32> = FutureCell::new();
        cell.set(7);
        assert!(format!("{cell}").contains('7'));
    }

    #[test]
    fn delegating_renders_upstream_chain() {
        let upstream: FutureCell<i32> = FutureCell::new();
        let downstream: FutureCell<i32> = FutureCell::new();
        downstream.delegate_to(upstream);
        let text = format!("{downstream}");
        assert!(text.starts_with("DELEGATING("));
    }
}
