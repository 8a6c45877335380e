//! Playback states and the request legality table shared by both peers.

use std::fmt;

use crate::protocol::rtsp::Method;

/// Control-channel state of one streaming session.
///
/// ```text
///            SETUP            PLAY
///   INIT ──────────► READY ─────────► PLAYING
///    ▲                 ▲  PAUSE/STOP     │
///    │                 └─────────────────┘
///    └───────────── TEARDOWN ────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Init,
    Ready,
    Playing,
}

impl PlaybackState {
    /// Whether `method` may be issued (client) or served (server) in this
    /// state.
    ///
    /// STOP and TEARDOWN are refused only from READY.  DESCRIBE is accepted
    /// everywhere.
    pub fn permits(self, method: Method) -> bool {
        match method {
            Method::Setup => self == PlaybackState::Init,
            Method::Play => self == PlaybackState::Ready,
            Method::Pause => self == PlaybackState::Playing,
            Method::Stop | Method::Teardown => self != PlaybackState::Ready,
            Method::Describe => true,
        }
    }

    /// The state reached once `method` has been accepted with a 200 reply.
    pub fn after(self, method: Method) -> PlaybackState {
        match method {
            Method::Setup | Method::Pause | Method::Stop => PlaybackState::Ready,
            Method::Play => PlaybackState::Playing,
            Method::Teardown => PlaybackState::Init,
            Method::Describe => self,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlaybackState::Init => "INIT",
            PlaybackState::Ready => "READY",
            PlaybackState::Playing => "PLAYING",
        })
    }
}
