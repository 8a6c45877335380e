//! # vstream-core
//!
//! Shared library for vstream containing the data-channel packet codec, the
//! control-channel text protocol, and the session state used by both the
//! server and the client.
//!
//! It performs no socket I/O of its own.
//!
//! # Architecture overview (for beginners)
//!
//! vstream streams a video (a sequence of JPEG frames) from a server to a
//! client over two channels:
//!
//! - A reliable **control channel** (TCP) carries short text requests such as
//!   `SETUP`, `PLAY` and `PAUSE`, and the server's replies.
//! - An unreliable **data channel** (UDP) carries one packet per frame.  Lost
//!   or reordered packets are detected from the packet sequence number.
//!
//! This crate defines:
//!
//! - **`protocol`** – The bytes on both channels: the 12-byte packet header,
//!   request/reply text, message framing on the control stream, and the
//!   `CSeq` counter.
//!
//! - **`session`** – The INIT/READY/PLAYING state machine, the rules for
//!   accepting a reply, receive statistics, and the per-play cancellation
//!   signal.

pub mod protocol;
pub mod session;

pub use protocol::packet::{decode_packet, encode_packet, PacketError, RtpHeader, RtpPacket};
pub use protocol::rtsp::{Method, Reply, Request, StatusCode};
pub use session::{
    CancelSignal, PlaybackState, ReplyOutcome, SessionRecord, StatsHandle, StopReason,
    StreamStats,
};
