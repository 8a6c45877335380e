//! Binary codec for data-channel packets.
//!
//! Wire format (RTP fixed header, RFC 3550 §5.1):
//! ```text
//! byte 0: [version:2][padding:1][extension:1][csrc_count:4]
//! byte 1: [marker:1][payload_type:7]
//! bytes 2..4:  sequence number (u16)
//! bytes 4..8:  timestamp (u32, wall-clock seconds)
//! bytes 8..12: SSRC (u32)
//! bytes 12..:  payload
//! ```
//! Total header size: 12 bytes. All multi-byte integers are big-endian.
//!
//! # Why is the timestamp not part of equality? (for beginners)
//!
//! The encoder always stamps the *current* wall-clock time into the header.
//! Two encodes of the same frame a second apart therefore produce different
//! bytes.  [`RtpHeader::same_fields`] compares every header field except the
//! timestamp, which is what "round-trip" means for this codec.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Size of the fixed packet header in bytes.
pub const HEADER_SIZE: usize = 12;

/// The only protocol version this codec produces or accepts.
pub const RTP_VERSION: u8 = 2;

/// Payload type tagging a JPEG (MJPEG) frame payload.
pub const PAYLOAD_TYPE_MJPEG: u8 = 26;

/// Errors that can occur during packet encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum PacketError {
    /// The byte slice is shorter than the fixed header.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The version bits in the header are not [`RTP_VERSION`].
    #[error("unsupported packet version: {0}")]
    UnsupportedVersion(u8),

    /// A header field does not fit in its bit width.
    #[error("field {field} out of range: {value} exceeds {max}")]
    FieldOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
}

/// The 12-byte fixed header of a data-channel packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Protocol version (2 bits). Always [`RTP_VERSION`] on the wire.
    pub version: u8,
    /// Padding flag.
    pub padding: bool,
    /// Header extension flag.
    pub extension: bool,
    /// Contributing-source count (4 bits).
    pub csrc_count: u8,
    /// Marker bit.
    pub marker: bool,
    /// Payload type (7 bits).
    pub payload_type: u8,
    /// Sequence number; wraps at 65536.
    pub sequence_number: u16,
    /// Capture timestamp in whole seconds. Informational only.
    pub timestamp: u32,
    /// Synchronization source identifier.
    pub ssrc: u32,
}

impl RtpHeader {
    /// Builds a header for an MJPEG frame with all flags cleared.
    pub fn mjpeg(sequence_number: u16, ssrc: u32) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type: PAYLOAD_TYPE_MJPEG,
            sequence_number,
            timestamp: 0,
            ssrc,
        }
    }

    /// Compares every field except `timestamp`.
    pub fn same_fields(&self, other: &RtpHeader) -> bool {
        Self {
            timestamp: 0,
            ..*self
        } == Self {
            timestamp: 0,
            ..*other
        }
    }

    fn validate(&self) -> Result<(), PacketError> {
        if self.version != RTP_VERSION {
            return Err(PacketError::UnsupportedVersion(self.version));
        }
        check_width("csrc_count", self.csrc_count, 0x0F)?;
        check_width("payload_type", self.payload_type, 0x7F)?;
        Ok(())
    }
}

/// A decoded data-channel packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub payload: Vec<u8>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `header` and `payload`, stamping the current wall-clock time
/// (seconds since the Unix epoch, truncated to 32 bits) into the timestamp.
///
/// The `timestamp` field of `header` is ignored.
///
/// # Errors
///
/// Returns [`PacketError::UnsupportedVersion`] unless `version` is
/// [`RTP_VERSION`], and [`PacketError::FieldOutOfRange`] if a field exceeds
/// its bit width.
///
/// # Examples
///
/// ```rust
/// use vstream_core::protocol::packet::{decode_packet, encode_packet, RtpHeader};
///
/// let header = RtpHeader::mjpeg(7, 0);
/// let bytes = encode_packet(&header, b"frame").unwrap();
/// let packet = decode_packet(&bytes).unwrap();
/// assert!(packet.header.same_fields(&header));
/// assert_eq!(packet.payload, b"frame");
/// ```
pub fn encode_packet(header: &RtpHeader, payload: &[u8]) -> Result<Vec<u8>, PacketError> {
    encode_packet_at(header, payload, current_timestamp_secs())
}

/// Encodes `header` and `payload` with an explicit `timestamp`.
///
/// # Errors
///
/// Returns [`PacketError::UnsupportedVersion`] unless `version` is
/// [`RTP_VERSION`], and [`PacketError::FieldOutOfRange`] if a field exceeds
/// its bit width.
pub fn encode_packet_at(
    header: &RtpHeader,
    payload: &[u8],
    timestamp: u32,
) -> Result<Vec<u8>, PacketError> {
    header.validate()?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(
        (header.version << 6)
            | (u8::from(header.padding) << 5)
            | (u8::from(header.extension) << 4)
            | header.csrc_count,
    );
    buf.push((u8::from(header.marker) << 7) | header.payload_type);
    buf.extend_from_slice(&header.sequence_number.to_be_bytes());
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(&header.ssrc.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decodes one packet from a datagram.
///
/// Everything after the 12-byte header is the payload, copied unchanged.
///
/// # Errors
///
/// Returns [`PacketError::InsufficientData`] for buffers shorter than
/// [`HEADER_SIZE`] and [`PacketError::UnsupportedVersion`] when the version
/// bits are not [`RTP_VERSION`].
pub fn decode_packet(bytes: &[u8]) -> Result<RtpPacket, PacketError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PacketError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0] >> 6;
    if version != RTP_VERSION {
        return Err(PacketError::UnsupportedVersion(version));
    }

    let header = RtpHeader {
        version,
        padding: bytes[0] & 0x20 != 0,
        extension: bytes[0] & 0x10 != 0,
        csrc_count: bytes[0] & 0x0F,
        marker: bytes[1] & 0x80 != 0,
        payload_type: bytes[1] & 0x7F,
        sequence_number: u16::from_be_bytes([bytes[2], bytes[3]]),
        timestamp: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        ssrc: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
    };

    Ok(RtpPacket {
        header,
        payload: bytes[HEADER_SIZE..].to_vec(),
    })
}

/// Current wall-clock time in whole seconds, truncated to 32 bits.
pub fn current_timestamp_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

fn check_width(field: &'static str, value: u8, max: u8) -> Result<(), PacketError> {
    if value > max {
        return Err(PacketError::FieldOutOfRange {
            field,
            value: u32::from(value),
            max: u32::from(max),
        });
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
