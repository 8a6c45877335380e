//! Wire formats: the binary data-channel packet, the text control messages,
//! control-stream framing, and the request sequence counter.

pub mod framing;
pub mod packet;
pub mod rtsp;
pub mod sequence;

pub use framing::{frame_message, ControlFramer, FramingError};
pub use packet::{decode_packet, encode_packet, PacketError, RtpHeader, RtpPacket};
pub use rtsp::{Method, Reply, Request, RtspError, StatusCode};
pub use sequence::SequenceCounter;
