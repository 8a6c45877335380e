//! Client control engine.
//!
//! A [`ClientSession`] owns one control connection and the session record for
//! it.  Requests are sent strictly one at a time: each call checks legality,
//! sends, then waits for the correlated reply before returning.  Replies are
//! read by a background task and handed over on a channel, so a reply that
//! fails correlation (stale `CSeq`, foreign session) is dropped and the wait
//! continues.
//!
//! SETUP binds the data socket before the request goes out so the advertised
//! port is the bound one; the socket is released again unless the reply is
//! accepted.  Other side effects run only after an accepted reply:
//!
//! | Request  | Effect                                                      |
//! |----------|-------------------------------------------------------------|
//! | SETUP    | keep the data socket bound for the advertised port         |
//! | PLAY     | spawn the receive loop with a fresh stop signal             |
//! | PAUSE    | stop the loop, keep the socket, log the statistics          |
//! | STOP     | stop the loop, keep the socket, reset the statistics        |
//! | TEARDOWN | stop the loop, release the socket, close the connection     |
//! | DESCRIBE | none; the text arrives on the side channel                  |

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use vstream_core::protocol::framing::{frame_message, ControlFramer, UNTERMINATED_GRACE};
use vstream_core::{
    CancelSignal, Method, PlaybackState, Reply, ReplyOutcome, Request, SessionRecord,
    StatsHandle, StopReason, StreamStats,
};

use super::describe::DescribeListener;
use super::receiver::{run_receive_loop, DeliveredFrame};
use super::ClientError;
use crate::domain::ClientConfig;

const REPLY_QUEUE: usize = 16;

struct ActivePlay {
    signal: CancelSignal,
    task: JoinHandle<Option<StopReason>>,
}

/// One client's control connection and everything it owns.
pub struct ClientSession {
    config: ClientConfig,
    target: String,
    record: SessionRecord,
    writer: OwnedWriteHalf,
    replies: mpsc::Receiver<Reply>,
    reader_task: JoinHandle<()>,
    control_closed: bool,
    data_socket: Option<Arc<UdpSocket>>,
    play: Option<ActivePlay>,
    stats: StatsHandle,
    frames: mpsc::Sender<DeliveredFrame>,
}

impl ClientSession {
    /// Connects to `config.server_addr` for the media named `target`.
    ///
    /// Returns the session and the receiving end of the delivered-frame
    /// channel.  The session starts in INIT.
    ///
    /// # Errors
    ///
    /// [`ClientError::ConnectFailed`] if the TCP connection cannot be made.
    pub async fn connect(
        config: ClientConfig,
        target: impl Into<String>,
    ) -> Result<(Self, mpsc::Receiver<DeliveredFrame>), ClientError> {
        let addr = config.server_addr;
        let stream = TcpStream::connect(addr).await.map_err(|source| {
            warn!("connection to {addr} failed: {source}");
            ClientError::ConnectFailed { addr, source }
        })?;
        info!("connected to {addr}");

        let (reader, writer) = stream.into_split();
        let (reply_tx, replies) = mpsc::channel(REPLY_QUEUE);
        let reader_task = tokio::spawn(read_replies(reader, reply_tx));
        let (frames, frames_rx) = mpsc::channel(config.frame_buffer.max(1));

        let session = Self {
            config,
            target: target.into(),
            record: SessionRecord::new(),
            writer,
            replies,
            reader_task,
            control_closed: false,
            data_socket: None,
            play: None,
            stats: StatsHandle::new(),
            frames,
        };
        Ok((session, frames_rx))
    }

    pub fn state(&self) -> PlaybackState {
        self.record.state()
    }

    pub fn session_id(&self) -> Option<u64> {
        self.record.session_id()
    }

    /// `CSeq` of the last request sent.
    pub fn cseq(&self) -> u32 {
        self.record.cseq()
    }

    /// Local port of the data socket, once bound.
    pub fn data_port(&self) -> Option<u16> {
        let socket = self.data_socket.as_ref()?;
        socket.local_addr().ok().map(|addr| addr.port())
    }

    /// Whether the server closed its side of the control connection after
    /// an accepted TEARDOWN.
    pub fn is_control_closed(&self) -> bool {
        self.control_closed
    }

    pub fn is_receiving(&self) -> bool {
        self.play.is_some()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats.snapshot()
    }

    pub async fn setup(&mut self) -> Result<(), ClientError> {
        self.expect_ok(Method::Setup).await
    }

    pub async fn play(&mut self) -> Result<(), ClientError> {
        self.expect_ok(Method::Play).await
    }

    pub async fn pause(&mut self) -> Result<(), ClientError> {
        self.expect_ok(Method::Pause).await
    }

    pub async fn stop(&mut self) -> Result<(), ClientError> {
        self.expect_ok(Method::Stop).await
    }

    pub async fn teardown(&mut self) -> Result<(), ClientError> {
        self.expect_ok(Method::Teardown).await
    }

    /// Asks the server for the session description.
    ///
    /// A one-shot listener is bound on `config.describe_port` before the
    /// request goes out; the server connects back and pushes the text.  The
    /// playback state is unchanged.
    pub async fn describe(&mut self) -> Result<String, ClientError> {
        let listener = DescribeListener::bind(self.config.describe_port).await?;
        let outcome = self.exchange(Method::Describe, Some(listener.port())).await?;
        if let ReplyOutcome::Rejected { method, status } = outcome {
            return Err(ClientError::Rejected { method, status });
        }
        let text = listener.receive(self.config.describe_timeout).await?;
        debug!("description received ({} bytes)", text.len());
        Ok(text)
    }

    /// Sends one request and waits for its correlated reply.
    ///
    /// Returns [`ReplyOutcome::Accepted`] or [`ReplyOutcome::Rejected`];
    /// dropped replies are consumed internally.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotAllowed`] if `method` is illegal in the current
    ///   state.  Nothing is sent.
    /// - [`ClientError::ReplyTimeout`] if no correlated reply arrives within
    ///   `config.reply_timeout`.  The state is unchanged.
    /// - [`ClientError::ConnectionClosed`] if the server hangs up.
    pub async fn request(&mut self, method: Method) -> Result<ReplyOutcome, ClientError> {
        self.exchange(method, None).await
    }

    async fn expect_ok(&mut self, method: Method) -> Result<(), ClientError> {
        match self.request(method).await? {
            ReplyOutcome::Rejected { method, status } => {
                warn!("{method} rejected: {status}");
                Err(ClientError::Rejected { method, status })
            }
            _ => Ok(()),
        }
    }

    async fn exchange(
        &mut self,
        method: Method,
        desc_port: Option<u16>,
    ) -> Result<ReplyOutcome, ClientError> {
        // Bind before the CSeq is taken so a bind failure leaves no request pending.
        let client_port = match method {
            Method::Setup if self.record.state().permits(method) => {
                Some(self.bind_data_socket().await?)
            }
            _ => None,
        };
        let cseq = self.record.begin_request(method)?;
        let mut request = Request::new(method, self.target.clone(), cseq);
        match method {
            Method::Setup => {
                if let Some(port) = client_port {
                    request = request.with_client_port(port);
                }
            }
            Method::Describe => {
                if let Some(port) = desc_port {
                    request = request.with_desc_port(port);
                }
            }
            _ => {
                if let Some(id) = self.record.session_id() {
                    request = request.with_session(id);
                }
            }
        }

        self.writer.write_all(&frame_message(&request)).await?;
        debug!("sent {method} CSeq {cseq}");

        let result = self.await_reply(method).await;
        if method == Method::Setup && !matches!(result, Ok(ReplyOutcome::Accepted { .. })) {
            self.close_data_socket();
        }
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(ClientError::ConnectionClosed) => {
                self.halt(StopReason::Disconnect).await;
                return Err(ClientError::ConnectionClosed);
            }
            Err(e) => return Err(e),
        };

        if let ReplyOutcome::Accepted { from, to, .. } = outcome {
            info!("{method} accepted: {from} -> {to}");
            self.apply(method).await;
        }
        Ok(outcome)
    }

    async fn await_reply(&mut self, method: Method) -> Result<ReplyOutcome, ClientError> {
        let timeout = self.config.reply_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            let reply = match tokio::time::timeout_at(deadline, self.replies.recv()).await {
                Err(_) => {
                    warn!("no reply to {method} within {timeout:?}");
                    return Err(ClientError::ReplyTimeout { method, timeout });
                }
                Ok(None) => return Err(ClientError::ConnectionClosed),
                Ok(Some(reply)) => reply,
            };
            match self.record.accept_reply(&reply) {
                ReplyOutcome::Dropped(reason) => {
                    debug!("ignoring reply CSeq {}: {reason:?}", reply.cseq)
                }
                outcome => return Ok(outcome),
            }
        }
    }

    async fn apply(&mut self, method: Method) {
        match method {
            Method::Setup | Method::Describe => {}
            Method::Play => self.start_receiving().await,
            Method::Pause => {
                self.halt(StopReason::Pause).await;
                let s = self.stats.snapshot();
                info!(
                    "paused at frame {}: {} received, {} lost ({:.1}%), {:.0} bytes/s",
                    s.highest_frame,
                    s.frames_received,
                    s.frames_lost,
                    s.loss_rate() * 100.0,
                    s.throughput_bps()
                );
            }
            Method::Stop => {
                self.halt(StopReason::Stop).await;
                self.stats.reset();
            }
            Method::Teardown => {
                self.halt(StopReason::Teardown).await;
                self.close_data_socket();
                if let Err(e) = self.writer.shutdown().await {
                    debug!("control shutdown: {e}");
                }
                self.await_server_close().await;
            }
        }
    }

    /// Waits for the reader to see EOF, i.e. the server closed its side too.
    async fn await_server_close(&mut self) {
        if self.control_closed {
            return;
        }
        match tokio::time::timeout(self.config.reply_timeout, &mut self.reader_task).await {
            Ok(_) => {
                debug!("server closed the control connection");
                self.control_closed = true;
            }
            Err(_) => {
                warn!("server kept the control connection open after TEARDOWN");
                self.reader_task.abort();
            }
        }
    }

    async fn bind_data_socket(&mut self) -> Result<u16, ClientError> {
        if self.data_socket.is_none() {
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.data_port));
            let socket = UdpSocket::bind(addr).await.map_err(|source| {
                warn!("data socket bind on {addr} failed: {source}");
                ClientError::BindFailed { addr, source }
            })?;
            debug!("data socket bound on {}", socket.local_addr()?);
            self.data_socket = Some(Arc::new(socket));
        }
        self.data_port()
            .ok_or_else(|| ClientError::Io(std::io::ErrorKind::NotConnected.into()))
    }

    async fn start_receiving(&mut self) {
        // A replayed PLAY after PAUSE reuses the socket; after a failed bind it retries.
        if self.data_socket.is_none() {
            if let Err(e) = self.bind_data_socket().await {
                warn!("cannot receive data: {e}");
                return;
            }
        }
        let Some(socket) = self.data_socket.clone() else {
            return;
        };
        let signal = CancelSignal::new();
        let task = tokio::spawn(run_receive_loop(
            socket,
            signal.clone(),
            self.stats.clone(),
            self.frames.clone(),
            self.config.recv_timeout,
        ));
        self.play = Some(ActivePlay { signal, task });
    }

    async fn halt(&mut self, reason: StopReason) {
        let Some(play) = self.play.take() else {
            return;
        };
        play.signal.raise(reason);
        if let Err(e) = play.task.await {
            warn!("receive loop ended abnormally: {e}");
        }
    }

    fn close_data_socket(&mut self) {
        match self.data_socket.take() {
            Some(_) => debug!("data socket closed"),
            None => debug!("data socket already closed"),
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if let Some(play) = &self.play {
            play.signal.raise(StopReason::Disconnect);
        }
        self.reader_task.abort();
    }
}

/// Reads framed replies off the control stream until EOF.
async fn read_replies(mut reader: OwnedReadHalf, replies: mpsc::Sender<Reply>) {
    let mut framer = ControlFramer::new();
    let mut buf = [0u8; 4096];

    loop {
        let read = if framer.buffered() > 0 {
            tokio::time::timeout(UNTERMINATED_GRACE, reader.read(&mut buf)).await
        } else {
            Ok(reader.read(&mut buf).await)
        };
        let n = match read {
            // Peer went quiet mid-buffer: it sent a reply without the empty line.
            Err(_) => {
                if let Some(text) = framer.take_remaining() {
                    if !forward(&text, &replies).await {
                        return;
                    }
                }
                continue;
            }
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                debug!("control read failed: {e}");
                break;
            }
        };
        framer.push(&buf[..n]);
        loop {
            match framer.next_message() {
                Ok(Some(text)) => {
                    if !forward(&text, &replies).await {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => debug!("{e}"),
            }
        }
    }

    if let Some(text) = framer.take_remaining() {
        forward(&text, &replies).await;
    }
    debug!("control reader finished");
}

async fn forward(text: &str, replies: &mpsc::Sender<Reply>) -> bool {
    match text.parse::<Reply>() {
        Ok(reply) => replies.send(reply).await.is_ok(),
        Err(e) => {
            debug!("dropping unparseable reply: {e}");
            true
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
