//! Data send loop: one task per play, pushing one packet per interval.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use vstream_core::protocol::packet::{encode_packet, RtpHeader, PAYLOAD_TYPE_MJPEG};
use vstream_core::CancelSignal;

use crate::application::frame_source::SharedSource;

/// Pacing and packetization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSettings {
    /// Wait between two packets.  The only pacing in the system.
    pub interval: Duration,
    pub payload_type: u8,
    pub ssrc: u32,
}

impl Default for SendSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            payload_type: PAYLOAD_TYPE_MJPEG,
            ssrc: 0,
        }
    }
}

/// How a send loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The cancellation signal was raised.
    Cancelled,
    /// The frame source ran out of frames.
    EndOfStream,
    /// The frame source failed; the error was logged.
    SourceFailed,
}

/// Sends frames from `source` to `dest` until cancelled or exhausted.
///
/// Each packet carries the source's frame index (truncated to 16 bits) as its
/// sequence number.  Send failures are logged and the loop carries on.
pub async fn run_send_loop(
    socket: Arc<UdpSocket>,
    dest: SocketAddr,
    source: SharedSource,
    signal: CancelSignal,
    settings: SendSettings,
) -> SendOutcome {
    debug!("send loop to {dest} started");
    loop {
        tokio::select! {
            biased;
            _ = signal.raised() => break,
            _ = tokio::time::sleep(settings.interval) => {}
        }
        if signal.is_raised() {
            break;
        }

        let (index, payload) = match source.read_next().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("end of media reached for {dest}");
                return SendOutcome::EndOfStream;
            }
            Err(e) => {
                warn!("frame source failed for {dest}: {e}");
                return SendOutcome::SourceFailed;
            }
        };

        let header = RtpHeader {
            payload_type: settings.payload_type,
            ..RtpHeader::mjpeg(index as u16, settings.ssrc)
        };
        let packet = match encode_packet(&header, &payload) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("could not packetize frame {index}: {e}");
                continue;
            }
        };

        if let Err(e) = socket.send_to(&packet, dest).await {
            warn!("send of frame {index} to {dest} failed: {e}");
        }
    }

    debug!(
        "send loop to {dest} cancelled ({})",
        signal.reason().map_or("no reason".to_string(), |r| r.to_string())
    );
    SendOutcome::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::frame_source::{FrameSourceError, MockFrameSource};
    use crate::infrastructure::media::MemoryFrameSource;
    use vstream_core::{decode_packet, StopReason};

    fn fast() -> SendSettings {
        SendSettings {
            interval: Duration::from_millis(5),
            ..SendSettings::default()
        }
    }

    async fn receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn sender_socket() -> Arc<UdpSocket> {
        Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap())
    }

    #[tokio::test]
    async fn test_sends_every_frame_with_its_index_then_ends() {
        // Arrange
        let (rx, dest) = receiver().await;
        let frames = Arc::new(vec![b"f1".to_vec(), b"f2".to_vec(), b"f3".to_vec()]);
        let source = SharedSource::new(Box::new(MemoryFrameSource::new(frames)));

        // Act
        let outcome = run_send_loop(
            sender_socket().await,
            dest,
            source,
            CancelSignal::new(),
            fast(),
        )
        .await;

        // Assert
        assert_eq!(outcome, SendOutcome::EndOfStream);
        let mut buf = [0u8; 1500];
        for expected in 1..=3u16 {
            let n = rx.recv(&mut buf).await.unwrap();
            let packet = decode_packet(&buf[..n]).unwrap();
            assert_eq!(packet.header.sequence_number, expected);
            assert_eq!(packet.header.payload_type, 26);
            assert_eq!(packet.header.ssrc, 0);
            assert_eq!(packet.payload, format!("f{expected}").into_bytes());
        }
    }

    #[tokio::test]
    async fn test_raised_signal_stops_loop_without_sending() {
        // Arrange
        let (_rx, dest) = receiver().await;
        let mut mock = MockFrameSource::new();
        mock.expect_next_frame().never();
        mock.expect_frame_index().return_const(0u32);
        let signal = CancelSignal::new();
        signal.raise(StopReason::Pause);

        // Act
        let outcome = run_send_loop(
            sender_socket().await,
            dest,
            SharedSource::new(Box::new(mock)),
            signal,
            fast(),
        )
        .await;

        // Assert
        assert_eq!(outcome, SendOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_mid_play_ends_loop_promptly() {
        // Arrange – an endless source
        let (_rx, dest) = receiver().await;
        let mut mock = MockFrameSource::new();
        mock.expect_next_frame().returning(|| Ok(Some(vec![0u8; 8])));
        mock.expect_frame_index().return_const(1u32);
        let signal = CancelSignal::new();
        let task = tokio::spawn(run_send_loop(
            sender_socket().await,
            dest,
            SharedSource::new(Box::new(mock)),
            signal.clone(),
            fast(),
        ));

        // Act
        tokio::time::sleep(Duration::from_millis(30)).await;
        signal.raise(StopReason::Teardown);

        // Assert
        let outcome = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop must exit after cancellation")
            .unwrap();
        assert_eq!(outcome, SendOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_source_error_ends_loop() {
        let (_rx, dest) = receiver().await;
        let mut mock = MockFrameSource::new();
        mock.expect_next_frame()
            .returning(|| Err(FrameSourceError::NotFound("gone".to_string())));
        mock.expect_frame_index().return_const(0u32);

        let outcome = run_send_loop(
            sender_socket().await,
            dest,
            SharedSource::new(Box::new(mock)),
            CancelSignal::new(),
            fast(),
        )
        .await;

        assert_eq!(outcome, SendOutcome::SourceFailed);
    }

    #[tokio::test]
    async fn test_slow_source_read_does_not_stall_the_runtime() {
        // Arrange – a source whose read blocks its thread
        let (_rx, dest) = receiver().await;
        let mut mock = MockFrameSource::new();
        mock.expect_next_frame().returning(|| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(None)
        });
        mock.expect_frame_index().return_const(0u32);
        let task = tokio::spawn(run_send_loop(
            sender_socket().await,
            dest,
            SharedSource::new(Box::new(mock)),
            CancelSignal::new(),
            fast(),
        ));

        // Act – a timer on the same single-threaded runtime
        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let waited = started.elapsed();

        // Assert
        assert!(waited < Duration::from_millis(250), "runtime stalled for {waited:?}");
        assert_eq!(task.await.unwrap(), SendOutcome::EndOfStream);
    }

    #[tokio::test]
    async fn test_configured_payload_type_and_ssrc_are_stamped() {
        // Arrange
        let (rx, dest) = receiver().await;
        let source = SharedSource::new(Box::new(MemoryFrameSource::new(Arc::new(vec![vec![1]]))));
        let settings = SendSettings {
            payload_type: 96,
            ssrc: 0xABCD,
            ..fast()
        };

        // Act
        run_send_loop(sender_socket().await, dest, source, CancelSignal::new(), settings).await;

        // Assert
        let mut buf = [0u8; 64];
        let n = rx.recv(&mut buf).await.unwrap();
        let packet = decode_packet(&buf[..n]).unwrap();
        assert_eq!(packet.header.payload_type, 96);
        assert_eq!(packet.header.ssrc, 0xABCD);
    }
}
