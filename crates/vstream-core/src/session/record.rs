//! The per-connection session record and the reply acceptance protocol.
//!
//! # Reply acceptance (for beginners)
//!
//! Replies on the control channel can be late, duplicated, or belong to a
//! different session.  The record only lets a reply drive the state machine
//! when all of the following hold:
//!
//! 1. A request is outstanding.
//! 2. The reply's `CSeq` equals the `CSeq` of that request.
//! 3. The reply's `Session` equals the established session id.  The very first
//!    accepted reply *establishes* the id; it never changes afterwards.
//!
//! Replies failing any check are dropped, not treated as errors.  Among the
//! survivors only `200 OK` causes a state transition.

use thiserror::Error;
use tracing::debug;

use crate::protocol::rtsp::{Method, Reply, StatusCode};
use crate::protocol::sequence::SequenceCounter;
use crate::session::state::PlaybackState;

/// Errors raised when a request is attempted.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    /// The request is not legal from the current state; nothing was sent.
    #[error("{method} is not allowed in state {state}")]
    NotAllowed {
        method: Method,
        state: PlaybackState,
    },
}

/// Why a reply was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No request is waiting for a reply (duplicate or unsolicited reply).
    NoPendingRequest,
    /// The reply's `CSeq` is not the last request's `CSeq`.
    StaleSequence { expected: u32, received: u32 },
    /// The reply names a different session than the established one.
    SessionMismatch { established: u64, received: Option<u64> },
}

/// What happened to a reply handed to [`SessionRecord::accept_reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// A 200 reply; the state machine moved from `from` to `to`.
    Accepted {
        method: Method,
        from: PlaybackState,
        to: PlaybackState,
    },
    /// A correlated reply with a non-200 status; state unchanged.
    Rejected { method: Method, status: StatusCode },
    /// The reply failed correlation and was ignored.
    Dropped(DropReason),
}

/// Protocol state for one control connection.
///
/// Owned exclusively by the connection's control engine; the data loops
/// never touch it.
#[derive(Debug, Default)]
pub struct SessionRecord {
    state: PlaybackState,
    cseq: SequenceCounter,
    session_id: Option<u64>,
    last_request: Option<Method>,
    awaiting_reply: bool,
}

impl SessionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// The established session id, if any reply has set it.
    pub fn session_id(&self) -> Option<u64> {
        self.session_id
    }

    /// `CSeq` of the most recent request (0 before the first request).
    pub fn cseq(&self) -> u32 {
        self.cseq.current()
    }

    pub fn last_request(&self) -> Option<Method> {
        self.last_request
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Validates `method` against the current state and, if legal, assigns
    /// the next `CSeq` and records the request as outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotAllowed`] without touching the counter when
    /// the state forbids `method`.
    pub fn begin_request(&mut self, method: Method) -> Result<u32, SessionError> {
        if !self.state.permits(method) {
            return Err(SessionError::NotAllowed {
                method,
                state: self.state,
            });
        }
        let cseq = self.cseq.advance();
        self.last_request = Some(method);
        self.awaiting_reply = true;
        Ok(cseq)
    }

    /// Applies the reply acceptance protocol to `reply`.
    pub fn accept_reply(&mut self, reply: &Reply) -> ReplyOutcome {
        let method = match (self.awaiting_reply, self.last_request) {
            (true, Some(method)) => method,
            _ => return self.drop_reply(DropReason::NoPendingRequest),
        };

        let expected = self.cseq.current();
        if reply.cseq != expected {
            return self.drop_reply(DropReason::StaleSequence {
                expected,
                received: reply.cseq,
            });
        }

        // Session id 0 means "unset" on the wire.
        let received = reply.session.filter(|&id| id != 0);
        match (self.session_id, received) {
            (None, Some(id)) => {
                debug!("session id established: {id}");
                self.session_id = Some(id);
            }
            (Some(established), received) if received != Some(established) => {
                return self.drop_reply(DropReason::SessionMismatch {
                    established,
                    received,
                });
            }
            _ => {}
        }

        self.awaiting_reply = false;

        if !reply.status.is_ok() {
            return ReplyOutcome::Rejected {
                method,
                status: reply.status,
            };
        }

        let from = self.state;
        self.state = from.after(method);
        ReplyOutcome::Accepted {
            method,
            from,
            to: self.state,
        }
    }

    fn drop_reply(&self, reason: DropReason) -> ReplyOutcome {
        debug!("dropping reply: {reason:?}");
        ReplyOutcome::Dropped(reason)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
