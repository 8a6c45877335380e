//! End-to-end tests: the real client against the real server on loopback.

use std::net::SocketAddr;
use std::sync::{atomic::AtomicBool, Arc};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use vstream_client::domain::ClientConfig;
use vstream_client::infrastructure::network::{ClientError, ClientSession, DeliveredFrame};
use vstream_core::{Method, PlaybackState};
use vstream_server::infrastructure::media::MemoryLibrary;
use vstream_server::infrastructure::network::{ControlServer, SendSettings};

const CLIP: &str = "movie.mjpg";

async fn start_server() -> SocketAddr {
    let frames = (1..=500u16).map(|i| i.to_be_bytes().to_vec()).collect();
    let library = Arc::new(MemoryLibrary::new().with_clip(CLIP, frames));
    let settings = SendSettings {
        interval: Duration::from_millis(5),
        ..SendSettings::default()
    };
    let server = ControlServer::bind("127.0.0.1:0".parse().unwrap(), library, settings)
        .await
        .expect("bind");
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run(Arc::new(AtomicBool::new(true))));
    addr
}

fn config(server_addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        server_addr,
        data_port: 0,
        describe_port: 0,
        recv_timeout: Duration::from_millis(50),
        reply_timeout: Duration::from_secs(2),
        describe_timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    }
}

async fn next_frame(frames: &mut mpsc::Receiver<DeliveredFrame>) -> DeliveredFrame {
    timeout(Duration::from_secs(2), frames.recv())
        .await
        .expect("frame must arrive")
        .expect("channel open")
}

#[tokio::test]
async fn test_setup_play_pause_teardown() {
    // Arrange
    let addr = start_server().await;
    let (mut session, mut frames) = ClientSession::connect(config(addr), CLIP).await.unwrap();

    // Act – SETUP
    session.setup().await.unwrap();

    // Assert
    assert_eq!(session.state(), PlaybackState::Ready);
    let id = session.session_id().expect("session id pinned");
    assert!((100_000..=999_999).contains(&id));
    assert!(session.data_port().is_some());

    // Act – PLAY
    session.play().await.unwrap();
    let first_three: Vec<u16> = vec![
        next_frame(&mut frames).await.sequence_number,
        next_frame(&mut frames).await.sequence_number,
        next_frame(&mut frames).await.sequence_number,
    ];

    // Assert
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(first_three, vec![1, 2, 3]);

    // Act – PAUSE
    session.pause().await.unwrap();

    // Assert
    assert_eq!(session.state(), PlaybackState::Ready);
    assert!(!session.is_receiving());
    let stats = session.stats();
    assert!(stats.highest_frame >= 3);
    assert_eq!(stats.frames_lost, 0);

    // Act – TEARDOWN is refused from READY, so resume first
    assert!(matches!(
        session.teardown().await,
        Err(ClientError::NotAllowed(_))
    ));
    session.play().await.unwrap();
    session.teardown().await.unwrap();

    // Assert – both sides released the session
    assert_eq!(session.state(), PlaybackState::Init);
    assert_eq!(session.data_port(), None);
    assert!(session.is_control_closed(), "server kept the control connection open");
}

#[tokio::test]
async fn test_play_after_pause_resumes_with_higher_frames() {
    // Arrange
    let addr = start_server().await;
    let (mut session, mut frames) = ClientSession::connect(config(addr), CLIP).await.unwrap();
    session.setup().await.unwrap();
    session.play().await.unwrap();
    next_frame(&mut frames).await;
    session.pause().await.unwrap();
    let paused_at = session.stats().highest_frame;
    while frames.try_recv().is_ok() {}

    // Act
    session.play().await.unwrap();
    let resumed = next_frame(&mut frames).await;

    // Assert
    assert!(resumed.sequence_number > paused_at);
    session.teardown().await.unwrap();
}

#[tokio::test]
async fn test_stop_resets_statistics_and_keeps_session() {
    // Arrange
    let addr = start_server().await;
    let (mut session, mut frames) = ClientSession::connect(config(addr), CLIP).await.unwrap();
    session.setup().await.unwrap();
    session.play().await.unwrap();
    next_frame(&mut frames).await;

    // Act
    session.stop().await.unwrap();

    // Assert
    assert_eq!(session.state(), PlaybackState::Ready);
    assert_eq!(session.stats().highest_frame, 0);
    assert!(session.data_port().is_some());

    // Act – playback can start again
    session.play().await.unwrap();
    next_frame(&mut frames).await;
    session.teardown().await.unwrap();
}

#[tokio::test]
async fn test_describe_pushes_session_description() {
    // Arrange
    let addr = start_server().await;
    let (mut session, _frames) = ClientSession::connect(config(addr), CLIP).await.unwrap();
    session.setup().await.unwrap();

    // Act
    let text = session.describe().await.unwrap();

    // Assert
    assert!(text.contains(CLIP), "description was {text:?}");
    assert_eq!(session.state(), PlaybackState::Ready);
}

#[tokio::test]
async fn test_pause_before_play_is_refused_locally() {
    // Arrange
    let addr = start_server().await;
    let (mut session, _frames) = ClientSession::connect(config(addr), CLIP).await.unwrap();
    session.setup().await.unwrap();
    let cseq = session.cseq();

    // Act
    let err = session.pause().await.unwrap_err();

    // Assert
    assert!(matches!(err, ClientError::NotAllowed(_)));
    assert_eq!(session.cseq(), cseq);

    // A legal request afterwards still gets its reply.
    let outcome = session.request(Method::Play).await;
    tokio_test::assert_ok!(outcome);
}
