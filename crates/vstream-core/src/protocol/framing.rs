//! Message framing for the control channel.
//!
//! The control channel is a TCP byte stream, so one `read()` may return half a
//! message or several messages at once.  vstream writes every message as its
//! header lines followed by one empty line (`\n\n`, or `\r\n\r\n` from CRLF
//! peers).  [`ControlFramer`] buffers incoming bytes and yields one complete
//! message text at a time.
//!
//! Plain peers send a bare header block with no empty line after it.  Readers
//! handle those by waiting [`UNTERMINATED_GRACE`] after the last read: if no
//! more bytes arrive, [`ControlFramer::take_remaining`] hands the buffered
//! text over as one message.

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// Terminator appended after every outbound message.
pub const MESSAGE_TERMINATOR: &str = "\n\n";

/// Quiet period after which buffered, unterminated text counts as a message.
pub const UNTERMINATED_GRACE: Duration = Duration::from_millis(50);

/// Upper bound on a buffered, unterminated message.
pub const MAX_MESSAGE_LEN: usize = 8 * 1024;

/// Errors produced while framing control messages.
#[derive(Debug, Error, PartialEq)]
pub enum FramingError {
    /// A complete message was not valid UTF-8. The message is discarded.
    #[error("control message is not valid UTF-8")]
    InvalidUtf8,

    /// More than [`MAX_MESSAGE_LEN`] bytes arrived without a terminator. The
    /// buffer is discarded.
    #[error("control message exceeds {max} bytes without a terminator")]
    MessageTooLarge { max: usize },
}

/// Serializes a request or reply for the wire, including the terminator.
pub fn frame_message(message: &impl Display) -> Vec<u8> {
    format!("{message}{MESSAGE_TERMINATOR}").into_bytes()
}

/// Accumulates bytes from the control stream and splits them into messages.
#[derive(Debug, Default)]
pub struct ControlFramer {
    buf: Vec<u8>,
}

impl ControlFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet returned as a message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete message, or `Ok(None)` if more bytes are
    /// needed.  Blank messages (stray newlines) are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError`] when a message is not UTF-8 or the buffer
    /// overflows; in both cases the offending bytes are dropped and the
    /// framer can keep being used.
    pub fn next_message(&mut self) -> Result<Option<String>, FramingError> {
        while let Some((body_end, frame_end)) = find_boundary(&self.buf) {
            let body: Vec<u8> = self.buf.drain(..frame_end).take(body_end).collect();
            let text = String::from_utf8(body).map_err(|_| FramingError::InvalidUtf8)?;
            if !text.trim().is_empty() {
                return Ok(Some(text));
            }
        }

        if self.buf.len() > MAX_MESSAGE_LEN {
            self.buf.clear();
            return Err(FramingError::MessageTooLarge {
                max: MAX_MESSAGE_LEN,
            });
        }
        Ok(None)
    }

    /// Drains the unterminated tail as one message.
    ///
    /// Called when the peer closes the stream, or when it has been quiet for
    /// [`UNTERMINATED_GRACE`] with bytes still buffered.
    pub fn take_remaining(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        String::from_utf8(rest)
            .ok()
            .filter(|text| !text.trim().is_empty())
    }
}

/// Finds the first empty line.  Returns `(body_end, frame_end)` where
/// `body_end` is the index of the newline that ends the last header line and
/// `frame_end` is one past the terminator.
fn find_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    buf.iter().enumerate().find_map(|(i, &b)| {
        if b != b'\n' {
            return None;
        }
        match (buf.get(i + 1), buf.get(i + 2)) {
            (Some(b'\n'), _) => Some((i, i + 2)),
            (Some(b'\r'), Some(b'\n')) => Some((i, i + 3)),
            _ => None,
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::rtsp::{Method, Reply, Request};

    #[test]
    fn test_frame_message_appends_terminator() {
        let bytes = frame_message(&Reply::ok(1, Some(9)));
        assert!(bytes.ends_with(b"Session: 9\n\n"));
    }

    #[test]
    fn test_partial_message_needs_more_bytes() {
        // Arrange
        let mut framer = ControlFramer::new();
        framer.push(b"RTSP/1.0 200 OK\nCSeq: 1\n");

        // Act / Assert
        assert_eq!(framer.next_message(), Ok(None));
        framer.push(b"Session: 5\n\n");
        assert_eq!(
            framer.next_message(),
            Ok(Some("RTSP/1.0 200 OK\nCSeq: 1\nSession: 5".to_string()))
        );
    }

    #[test]
    fn test_two_coalesced_messages_split_in_order() {
        // Arrange – simulates TCP coalescing two sends into one read
        let mut framer = ControlFramer::new();
        let first = Request::new(Method::Play, "a.mjpg", 2).with_session(1);
        let second = Request::new(Method::Pause, "a.mjpg", 3).with_session(1);
        framer.push(&frame_message(&first));
        framer.push(&frame_message(&second));

        // Act
        let a: Request = framer.next_message().unwrap().unwrap().parse().unwrap();
        let b: Request = framer.next_message().unwrap().unwrap().parse().unwrap();

        // Assert
        assert_eq!(a, first);
        assert_eq!(b, second);
        assert_eq!(framer.next_message(), Ok(None));
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_crlf_terminator_is_recognised() {
        let mut framer = ControlFramer::new();
        framer.push(b"RTSP/1.0 200 OK\r\nCSeq: 4\r\n\r\nRTSP");
        let text = framer.next_message().unwrap().unwrap();
        assert_eq!(text, "RTSP/1.0 200 OK\r\nCSeq: 4\r");
        assert_eq!(framer.buffered(), 4);
    }

    #[test]
    fn test_leading_blank_lines_are_skipped() {
        let mut framer = ControlFramer::new();
        framer.push(b"\n\n\n\nPLAY a RTSP/1.0\nCSeq: 1\n\n");
        let text = framer.next_message().unwrap().unwrap();
        assert!(text.starts_with("PLAY"));
    }

    #[test]
    fn test_invalid_utf8_message_is_dropped() {
        // Arrange
        let mut framer = ControlFramer::new();
        framer.push(&[0xFF, 0xFE, b'\n', b'\n']);
        framer.push(b"PLAY a RTSP/1.0\nCSeq: 1\n\n");

        // Act / Assert – the bad message errors, the next one is intact
        assert_eq!(framer.next_message(), Err(FramingError::InvalidUtf8));
        assert!(framer.next_message().unwrap().is_some());
    }

    #[test]
    fn test_oversized_unterminated_buffer_is_discarded() {
        let mut framer = ControlFramer::new();
        framer.push(&vec![b'A'; MAX_MESSAGE_LEN + 1]);
        assert_eq!(
            framer.next_message(),
            Err(FramingError::MessageTooLarge {
                max: MAX_MESSAGE_LEN
            })
        );
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_take_remaining_returns_unterminated_tail() {
        let mut framer = ControlFramer::new();
        framer.push(b"TEARDOWN a RTSP/1.0\nCSeq: 5\nSession: 1");
        assert_eq!(framer.next_message(), Ok(None));
        assert_eq!(
            framer.take_remaining().as_deref(),
            Some("TEARDOWN a RTSP/1.0\nCSeq: 5\nSession: 1")
        );
        assert_eq!(framer.take_remaining(), None);
    }
}
