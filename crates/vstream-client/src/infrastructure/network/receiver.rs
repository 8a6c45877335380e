//! Data receive loop: one task per play, reading packets until signalled.
//!
//! The socket read is bounded by `recv_timeout` so the loop can notice a raised
//! [`CancelSignal`] even when no packets arrive.  The signal is checked after
//! every outcome: a datagram, a timeout, or a socket error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use vstream_core::{decode_packet, CancelSignal, StatsHandle, StopReason};

use crate::application::frame_filter::{admit, Admission};

/// Largest datagram the loop will read.
pub const MAX_DATAGRAM_LEN: usize = 65_536;

/// A fresh frame handed to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredFrame {
    pub sequence_number: u16,
    pub payload: Vec<u8>,
}

/// What one bounded wait on the data socket produced.
#[derive(Debug)]
pub enum RecvOutcome {
    Datagram { len: usize, waited: Duration },
    TimedOut,
    Failed(std::io::Error),
}

async fn recv_bounded(socket: &UdpSocket, buf: &mut [u8], limit: Duration) -> RecvOutcome {
    let started = Instant::now();
    match tokio::time::timeout(limit, socket.recv(buf)).await {
        Ok(Ok(len)) => RecvOutcome::Datagram {
            len,
            waited: started.elapsed(),
        },
        Ok(Err(e)) => RecvOutcome::Failed(e),
        Err(_) => RecvOutcome::TimedOut,
    }
}

/// Receives packets on `socket` until `signal` is raised.
///
/// Fresh frames (see [`admit`]) are forwarded on `frames`; a full channel
/// drops the frame rather than stalling the socket.  Undecodable datagrams are
/// counted nowhere and skipped.
///
/// The loop never closes the socket itself.  It returns the reason it stopped
/// so the caller can release the socket on TEARDOWN and keep it otherwise.
pub async fn run_receive_loop(
    socket: Arc<UdpSocket>,
    signal: CancelSignal,
    stats: StatsHandle,
    frames: mpsc::Sender<DeliveredFrame>,
    recv_timeout: Duration,
) -> Option<StopReason> {
    debug!("receive loop started");
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

    loop {
        match recv_bounded(&socket, &mut buf, recv_timeout).await {
            RecvOutcome::Datagram { len, waited } => match decode_packet(&buf[..len]) {
                Ok(packet) => {
                    let seq = packet.header.sequence_number;
                    let admission =
                        stats.update(|s| admit(s, seq, packet.payload.len(), waited));
                    match admission {
                        Admission::Fresh { lost } => {
                            if lost > 0 {
                                debug!("{lost} frame(s) lost before {seq}");
                            }
                            let frame = DeliveredFrame {
                                sequence_number: seq,
                                payload: packet.payload,
                            };
                            if let Err(e) = frames.try_send(frame) {
                                trace!("frame {seq} not delivered: {e}");
                            }
                        }
                        Admission::Stale => trace!("discarding stale frame {seq}"),
                    }
                }
                Err(e) => debug!("ignoring undecodable datagram ({len} bytes): {e}"),
            },
            RecvOutcome::TimedOut => {}
            RecvOutcome::Failed(e) => {
                if !signal.is_raised() {
                    warn!("data socket receive failed: {e}");
                }
            }
        }

        if signal.is_raised() {
            break;
        }
    }

    let reason = signal.reason();
    match reason {
        Some(StopReason::Teardown) => debug!("receive loop released for teardown"),
        Some(other) => debug!("receive loop stopped ({other}); socket kept"),
        None => {}
    }
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use vstream_core::{encode_packet, RtpHeader};

    async fn socket_pair() -> (UdpSocket, Arc<UdpSocket>) {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.connect(receiver.local_addr().unwrap()).await.unwrap();
        (sender, Arc::new(receiver))
    }

    async fn send_frame(sender: &UdpSocket, seq: u16, payload: &[u8]) {
        let bytes = encode_packet(&RtpHeader::mjpeg(seq, 0), payload).unwrap();
        sender.send(&bytes).await.unwrap();
    }

    #[tokio::test]
    async fn test_fresh_frames_are_delivered_and_stale_dropped() {
        // Arrange
        let (sender, socket) = socket_pair().await;
        let signal = CancelSignal::new();
        let stats = StatsHandle::new();
        let (tx, mut rx) = mpsc::channel(8);
        let task = tokio::spawn(run_receive_loop(
            socket,
            signal.clone(),
            stats.clone(),
            tx,
            Duration::from_millis(20),
        ));

        // Act
        for seq in [1u16, 2, 2, 4] {
            send_frame(&sender, seq, b"jpeg").await;
        }
        let mut delivered = Vec::new();
        for _ in 0..3 {
            let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            delivered.push(frame.sequence_number);
        }
        signal.raise(StopReason::Pause);
        let reason = task.await.unwrap();

        // Assert
        assert_eq!(delivered, vec![1, 2, 4]);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_lost, 1);
        assert_eq!(snapshot.stale_discarded, 1);
        assert_eq!(snapshot.bytes_received, 12);
        assert_eq!(reason, Some(StopReason::Pause));
    }

    #[tokio::test]
    async fn test_loop_exits_within_bounded_wait_when_idle() {
        // Arrange
        let (_sender, socket) = socket_pair().await;
        let signal = CancelSignal::new();
        let (tx, _rx) = mpsc::channel(1);
        let task = tokio::spawn(run_receive_loop(
            socket,
            signal.clone(),
            StatsHandle::new(),
            tx,
            Duration::from_millis(20),
        ));

        // Act
        signal.raise(StopReason::Teardown);
        let reason = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop should notice the signal after one bounded wait")
            .unwrap();

        // Assert
        assert_eq!(reason, Some(StopReason::Teardown));
    }

    #[tokio::test]
    async fn test_garbage_datagram_is_skipped() {
        // Arrange
        let (sender, socket) = socket_pair().await;
        let signal = CancelSignal::new();
        let stats = StatsHandle::new();
        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(run_receive_loop(
            socket,
            signal.clone(),
            stats.clone(),
            tx,
            Duration::from_millis(20),
        ));

        // Act
        sender.send(&[0x00, 0x01, 0x02]).await.unwrap();
        send_frame(&sender, 1, b"ok").await;
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        signal.raise(StopReason::Stop);
        task.await.unwrap();

        // Assert
        assert_eq!(frame.sequence_number, 1);
        assert_eq!(stats.snapshot().frames_received, 1);
    }

    #[tokio::test]
    async fn test_full_channel_does_not_stall_the_loop() {
        // Arrange – capacity one, nobody reading
        let (sender, socket) = socket_pair().await;
        let signal = CancelSignal::new();
        let stats = StatsHandle::new();
        let (tx, _rx) = mpsc::channel(1);
        let task = tokio::spawn(run_receive_loop(
            socket,
            signal.clone(),
            stats.clone(),
            tx,
            Duration::from_millis(20),
        ));

        // Act
        for seq in 1..=5u16 {
            send_frame(&sender, seq, b"x").await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        signal.raise(StopReason::Pause);
        task.await.unwrap();

        // Assert
        assert_eq!(stats.snapshot().highest_frame, 5);
    }
}
