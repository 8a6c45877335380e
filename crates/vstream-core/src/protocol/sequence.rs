//! Request sequence counter (`CSeq`).
//!
//! # What is a CSeq? (for beginners)
//!
//! Every control request carries a number called `CSeq`.  The server copies
//! it into its reply, which lets the client tell which request a reply
//! belongs to.  A reply whose `CSeq` does not match the most recent request
//! is stale (for example a slow reply to a request the user has already
//! superseded) and is ignored.
//!
//! The counter starts at 0 and is advanced *before* each request, so the
//! first request on a connection carries `CSeq: 1`.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU32` internally, so a shared reference is enough
//! to advance it.  Within one control engine only the owning task advances
//! it; the atomic simply lets the session record be inspected from other
//! tasks (logging, tests) without a lock.

use std::sync::atomic::{AtomicU32, Ordering};

/// A monotonically increasing request sequence counter.
///
/// # Examples
///
/// ```rust
/// use vstream_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.current(), 0);
/// assert_eq!(counter.advance(), 1);
/// assert_eq!(counter.current(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU32,
}

impl SequenceCounter {
    /// Creates a new counter at 0.
    pub fn new() -> Self {
        Self {
            inner: AtomicU32::new(0),
        }
    }

    /// Increments the counter and returns the *new* value.
    ///
    /// Wraps from `u32::MAX` to 0 without panicking.
    ///
    /// `Ordering::Relaxed` is sufficient: the value orders requests on one
    /// connection and is not used to publish other memory.
    pub fn advance(&self) -> u32 {
        self.inner.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Returns the last value handed out by [`advance`](Self::advance), or 0.
    pub fn current(&self) -> u32 {
        self.inner.load(Ordering::Relaxed)
    }
}
