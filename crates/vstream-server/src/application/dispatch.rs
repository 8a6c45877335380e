//! Request dispatch decisions for the server control engine.
//!
//! Pure functions: given the worker's state and an incoming request, decide
//! whether to serve it.  The infrastructure worker performs the side effects.

use rand::Rng;
use vstream_core::{Method, PlaybackState};

/// What the worker should do with an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Serve the request and move to `next`.
    Serve { next: PlaybackState },
    /// Not legal in the current state; drop it without replying.
    Ignore,
}

/// Applies the legality table to `method` in `state`.
pub fn decide(state: PlaybackState, method: Method) -> Decision {
    if state.permits(method) {
        Decision::Serve {
            next: state.after(method),
        }
    } else {
        Decision::Ignore
    }
}

/// Smallest session identifier handed out.
pub const SESSION_ID_MIN: u64 = 100_000;
/// Largest session identifier handed out.
pub const SESSION_ID_MAX: u64 = 999_999;

/// Draws a random six-digit session identifier.
pub fn generate_session_id<R: Rng>(rng: &mut R) -> u64 {
    rng.gen_range(SESSION_ID_MIN..=SESSION_ID_MAX)
}
