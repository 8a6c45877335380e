//! Control-port accept loop.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::sender::SendSettings;
use super::worker::serve_connection;
use super::ServerError;
use crate::application::frame_source::MediaLibrary;
use crate::infrastructure::storage::config::ServerConfig;

/// How long one `accept()` may block before the shutdown flag is re-checked.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A bound control listener, ready to accept clients.
pub struct ControlServer {
    listener: TcpListener,
    library: Arc<dyn MediaLibrary>,
    settings: SendSettings,
}

impl ControlServer {
    /// Binds the control listener on `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the port is in use or not permitted.
    pub async fn bind(
        addr: SocketAddr,
        library: Arc<dyn MediaLibrary>,
        settings: SendSettings,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self {
            listener,
            library,
            settings,
        })
    }

    /// The address actually bound (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `running` is cleared, spawning one worker
    /// task per connection.
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; accept errors are logged and the
    /// loop continues.
    pub async fn run(self, running: Arc<AtomicBool>) -> Result<(), ServerError> {
        info!("control listener on {}", self.listener.local_addr()?);

        while running.load(Ordering::Relaxed) {
            match timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    info!("new control connection from {peer}");
                    let library = Arc::clone(&self.library);
                    let settings = self.settings;
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, peer, library, settings).await {
                            warn!("{peer}: connection ended with error: {e}");
                        }
                    });
                }
                Ok(Err(e)) => error!("accept error: {e}"),
                Err(_) => {}
            }
        }

        info!("shutdown flag cleared; stopping accept loop");
        Ok(())
    }
}

/// Binds the listener described by `config` and runs it until `running`
/// is cleared.
///
/// # Errors
///
/// Returns [`ServerError::Config`] for an unusable address and
/// [`ServerError::Bind`] if the listener cannot be bound.
pub async fn run_server(
    config: &ServerConfig,
    library: Arc<dyn MediaLibrary>,
    running: Arc<AtomicBool>,
) -> Result<(), ServerError> {
    let addr = config.control_addr()?;
    ControlServer::bind(addr, library, config.send_settings())
        .await?
        .run(running)
        .await
}
