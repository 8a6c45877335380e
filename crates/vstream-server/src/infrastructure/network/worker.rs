//! Per-connection server control engine.
//!
//! One [`Worker`] exists per accepted control connection.  It owns the
//! connection's playback state and a [`ClientInfo`] record; nothing else
//! mutates either.  Each served request is answered with `200 OK`.  Requests
//! that are not legal in the current state get no reply at all.
//!
//! ```text
//! control stream ──► ControlFramer ──► Request ──► Worker::handle ──► Reply
//!                                                      │
//!                                                      ├─ PLAY   → spawn send loop
//!                                                      ├─ PAUSE  → raise signal, join loop
//!                                                      └─ DESCRIBE → spawn side-channel push
//! ```
//!
//! Not-found and connection errors are logged as `404 NOT FOUND` /
//! `500 CONNECTION ERROR` and never written to the peer.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vstream_core::protocol::framing::{frame_message, ControlFramer, UNTERMINATED_GRACE};
use vstream_core::{CancelSignal, Method, PlaybackState, Reply, Request, StopReason};

use super::describe::push_description;
use super::sender::{run_send_loop, SendOutcome, SendSettings};
use super::ServerError;
use crate::application::dispatch::{decide, generate_session_id, Decision};
use crate::application::frame_source::{MediaLibrary, SharedSource};

/// Everything the server knows about one connected client.
#[derive(Debug)]
pub struct ClientInfo {
    /// Address of the control connection's peer.
    pub peer: SocketAddr,
    /// Media name from the SETUP request.
    pub media: Option<String>,
    /// Data-channel port from the SETUP `Transport` header.
    pub client_port: Option<u16>,
    /// Socket packets are sent from while playing.
    pub data_socket: Option<Arc<UdpSocket>>,
    pub session_id: Option<u64>,
    /// Signal for the current play, if one has started.
    pub signal: Option<CancelSignal>,
    /// `None` when SETUP could not open the media.
    pub source: Option<SharedSource>,
    send_task: Option<JoinHandle<SendOutcome>>,
}

impl ClientInfo {
    fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            media: None,
            client_port: None,
            data_socket: None,
            session_id: None,
            signal: None,
            source: None,
            send_task: None,
        }
    }

    /// Whether a send loop task is currently attached.
    pub fn is_sending(&self) -> bool {
        self.send_task.is_some()
    }
}

/// The control engine for one connection.
pub struct Worker {
    state: PlaybackState,
    client: ClientInfo,
    library: Arc<dyn MediaLibrary>,
    settings: SendSettings,
}

impl Worker {
    pub fn new(peer: SocketAddr, library: Arc<dyn MediaLibrary>, settings: SendSettings) -> Self {
        Self {
            state: PlaybackState::Init,
            client: ClientInfo::new(peer),
            library,
            settings,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn session_id(&self) -> Option<u64> {
        self.client.session_id
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    /// Serves `request`, returning the reply to send, or `None` when the
    /// request is ignored.
    pub async fn handle(&mut self, request: &Request) -> Option<Reply> {
        let next = match decide(self.state, request.method) {
            Decision::Serve { next } => next,
            Decision::Ignore => {
                debug!(
                    "{}: ignoring {} in state {}",
                    self.client.peer, request.method, self.state
                );
                return None;
            }
        };

        match request.method {
            Method::Setup => self.setup(request),
            Method::Play => {
                if !self.play().await {
                    return None;
                }
            }
            Method::Pause => self.halt(StopReason::Pause).await,
            Method::Stop => {
                self.halt(StopReason::Stop).await;
                self.reopen_source();
                self.close_data_socket();
            }
            Method::Teardown => {
                self.halt(StopReason::Teardown).await;
                self.close_data_socket();
            }
            Method::Describe => self.describe(request),
        }

        if next != self.state {
            info!(
                "{}: {} {} -> {}",
                self.client.peer, request.method, self.state, next
            );
        }
        self.state = next;
        Some(Reply::ok(request.cseq, self.client.session_id))
    }

    /// Stops any active send loop after the control connection has gone.
    pub async fn shutdown(&mut self) {
        self.halt(StopReason::Disconnect).await;
        self.close_data_socket();
    }

    fn setup(&mut self, request: &Request) {
        match self.library.open(&request.target) {
            Ok(source) => self.client.source = Some(SharedSource::new(source)),
            Err(e) => {
                // The handshake still completes with a session id.
                warn!("{}: 404 NOT FOUND: {e}", self.client.peer);
                self.client.source = None;
            }
        }
        self.client.media = Some(request.target.clone());
        self.client.session_id = Some(generate_session_id(&mut rand::thread_rng()));

        match request.client_port {
            Some(port) => self.client.client_port = Some(port),
            None => warn!("{}: SETUP without a client_port", self.client.peer),
        }
    }

    /// Opens a data socket and starts the send loop.  Returns `false` if the
    /// socket could not be opened.
    async fn play(&mut self) -> bool {
        let unspecified = match self.client.peer.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let socket = match UdpSocket::bind(SocketAddr::new(unspecified, 0)).await {
            Ok(socket) => Arc::new(socket),
            Err(e) => {
                error!(
                    "{}: 500 CONNECTION ERROR: cannot open data socket: {e}",
                    self.client.peer
                );
                return false;
            }
        };
        self.client.data_socket = Some(Arc::clone(&socket));

        let signal = CancelSignal::new();
        self.client.signal = Some(signal.clone());

        match (self.client.source.clone(), self.client.client_port) {
            (Some(source), Some(port)) => {
                let dest = SocketAddr::new(self.client.peer.ip(), port);
                self.client.send_task = Some(tokio::spawn(run_send_loop(
                    socket,
                    dest,
                    source,
                    signal,
                    self.settings,
                )));
            }
            (None, _) => warn!("{}: PLAY without media; nothing to send", self.client.peer),
            (_, None) => warn!("{}: PLAY without a data port; nothing to send", self.client.peer),
        }
        true
    }

    /// Raises the current play's signal and waits for its send loop to end.
    async fn halt(&mut self, reason: StopReason) {
        if let Some(signal) = self.client.signal.take() {
            signal.raise(reason);
        }
        if let Some(task) = self.client.send_task.take() {
            match task.await {
                Ok(outcome) => debug!("{}: send loop ended: {outcome:?}", self.client.peer),
                Err(e) => warn!("{}: send loop task failed: {e}", self.client.peer),
            }
        }
    }

    fn reopen_source(&mut self) {
        let Some(media) = self.client.media.as_deref() else {
            return;
        };
        match self.library.open(media) {
            Ok(fresh) => match &self.client.source {
                Some(shared) => shared.replace(fresh),
                None => self.client.source = Some(SharedSource::new(fresh)),
            },
            Err(e) => warn!("{}: 404 NOT FOUND: {e}", self.client.peer),
        }
    }

    fn close_data_socket(&mut self) {
        match self.client.data_socket.take() {
            Some(_) => debug!("{}: data socket closed", self.client.peer),
            None => debug!("{}: data socket already closed", self.client.peer),
        }
    }

    fn describe(&self, request: &Request) {
        let Some(port) = request.desc_port else {
            warn!("{}: DESCRIBE without DescPort; nothing pushed", self.client.peer);
            return;
        };
        let addr = SocketAddr::new(self.client.peer.ip(), port);
        let description = request.description();
        tokio::spawn(async move {
            match push_description(addr, &description).await {
                Ok(()) => debug!("description pushed to {addr}"),
                Err(e) => error!("500 CONNECTION ERROR: {e}"),
            }
        });
    }
}

// ── Connection driver ─────────────────────────────────────────────────────────

/// Runs the control engine for one accepted connection until EOF.
///
/// Any active send loop is cancelled when the connection ends.
///
/// # Errors
///
/// Returns [`ServerError::Io`] if reading from or writing to the control
/// stream fails.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    library: Arc<dyn MediaLibrary>,
    settings: SendSettings,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();
    let mut worker = Worker::new(peer, library, settings);
    let mut framer = ControlFramer::new();
    let mut buf = [0u8; 4096];

    let result = loop {
        let read = if framer.buffered() > 0 {
            tokio::time::timeout(UNTERMINATED_GRACE, reader.read(&mut buf)).await
        } else {
            Ok(reader.read(&mut buf).await)
        };
        let n = match read {
            // Peer went quiet mid-buffer: it sent a request without the empty line.
            Err(_) => {
                if let Some(text) = framer.take_remaining() {
                    if let Err(e) = respond(&mut worker, &text, &mut writer).await {
                        break Err(e);
                    }
                }
                continue;
            }
            Ok(Ok(0)) => break Ok(()),
            Ok(Ok(n)) => n,
            Ok(Err(e)) => break Err(ServerError::Io(e)),
        };
        framer.push(&buf[..n]);
        if let Err(e) = drain_requests(&mut worker, &mut framer, &mut writer).await {
            break Err(e);
        }
    };

    if result.is_ok() {
        if let Some(text) = framer.take_remaining() {
            if let Err(e) = respond(&mut worker, &text, &mut writer).await {
                debug!("{peer}: could not answer final request: {e}");
            }
        }
    }

    worker.shutdown().await;
    info!("{peer}: control connection closed");
    result
}

async fn drain_requests<W: AsyncWrite + Unpin>(
    worker: &mut Worker,
    framer: &mut ControlFramer,
    writer: &mut W,
) -> Result<(), ServerError> {
    loop {
        match framer.next_message() {
            Ok(Some(text)) => respond(worker, &text, writer).await?,
            Ok(None) => return Ok(()),
            Err(e) => warn!("{}: {e}", worker.client.peer),
        }
    }
}

async fn respond<W: AsyncWrite + Unpin>(
    worker: &mut Worker,
    text: &str,
    writer: &mut W,
) -> Result<(), ServerError> {
    let request: Request = match text.parse() {
        Ok(request) => request,
        Err(e) => {
            warn!("{}: dropping unparseable request: {e}", worker.client.peer);
            return Ok(());
        }
    };
    debug!("{}: received {} CSeq {}", worker.client.peer, request.method, request.cseq);

    if let Some(reply) = worker.handle(&request).await {
        writer.write_all(&frame_message(&reply)).await?;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
