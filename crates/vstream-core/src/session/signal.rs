//! Per-play cancellation signal.
//!
//! A [`CancelSignal`] is created fresh every time a session enters PLAYING and
//! is handed to the data loop spawned for that play.  The control engine
//! raises it on PAUSE, STOP, TEARDOWN, or when the control connection drops.
//! The first reason recorded wins; later raises are no-ops.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// Why a data loop was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Pause,
    Stop,
    Teardown,
    /// The control connection closed while playing.
    Disconnect,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Pause => "pause",
            StopReason::Stop => "stop",
            StopReason::Teardown => "teardown",
            StopReason::Disconnect => "disconnect",
        })
    }
}

/// A cloneable one-shot stop signal.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal.  Returns `true` if this call set the reason.
    pub fn raise(&self, reason: StopReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        first
    }

    pub fn is_raised(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason recorded by the first [`raise`](Self::raise), if any.
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Completes once the signal is raised.
    pub async fn raised(&self) {
        self.token.cancelled().await;
    }
}
