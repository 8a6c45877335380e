//! Session state shared by the client and server control engines.

pub mod record;
pub mod signal;
pub mod state;
pub mod stats;

pub use record::{DropReason, ReplyOutcome, SessionError, SessionRecord};
pub use signal::{CancelSignal, StopReason};
pub use state::PlaybackState;
pub use stats::{StatsHandle, StreamStats};
