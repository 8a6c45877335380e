//! DESCRIBE side channel: push the description text to the client.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::ServerError;

/// Upper bound on connecting to the client's description listener.
pub const DESCRIBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Connects to `addr`, writes `description`, and closes the connection.
///
/// The client reads until EOF, so closing the stream ends the message.
///
/// # Errors
///
/// Returns [`ServerError::Describe`] if the connection or write fails or
/// the connect does not complete within [`DESCRIBE_CONNECT_TIMEOUT`].
pub async fn push_description(addr: SocketAddr, description: &str) -> Result<(), ServerError> {
    let describe_err = |source| ServerError::Describe { addr, source };

    let mut stream = timeout(DESCRIBE_CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| {
            describe_err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connect timed out",
            ))
        })?
        .map_err(describe_err)?;

    stream
        .write_all(description.as_bytes())
        .await
        .map_err(describe_err)?;
    stream.shutdown().await.map_err(describe_err)
}
