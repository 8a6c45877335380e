//! DESCRIBE side channel: a one-shot TCP listener for the pushed description.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tracing::debug;

use super::ClientError;

/// Listener bound before DESCRIBE is sent, so the advertised port is live.
#[derive(Debug)]
pub struct DescribeListener {
    listener: TcpListener,
    port: u16,
}

impl DescribeListener {
    /// Binds on all interfaces at `port` (`0` picks a free port).
    pub async fn bind(port: u16) -> Result<Self, ClientError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ClientError::BindFailed { addr, source })?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    /// The port to advertise in the `DescPort` header.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Accepts one connection and reads it to EOF.
    ///
    /// The whole exchange, accept included, is bounded by `limit`.
    pub async fn receive(self, limit: Duration) -> Result<String, ClientError> {
        let listener = self.listener;
        let exchange = async move {
            let (mut stream, peer) = listener.accept().await?;
            debug!("description connection from {peer}");
            let mut text = String::new();
            stream.read_to_string(&mut text).await?;
            Ok::<_, std::io::Error>(text)
        };
        match tokio::time::timeout(limit, exchange).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ClientError::DescribeTimeout(limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_receives_pushed_text_until_eof() {
        // Arrange
        let listener = DescribeListener::bind(0).await.unwrap();
        let port = listener.port();
        let pusher = tokio::spawn(async move {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            stream.write_all(b"v= RTSP/1.0\nu= movie.mjpg").await.unwrap();
        });

        // Act
        let text = listener.receive(Duration::from_secs(2)).await.unwrap();
        pusher.await.unwrap();

        // Assert
        assert_eq!(text, "v= RTSP/1.0\nu= movie.mjpg");
    }

    #[tokio::test]
    async fn test_times_out_when_nothing_connects() {
        let listener = DescribeListener::bind(0).await.unwrap();
        let err = listener
            .receive(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::DescribeTimeout(_)));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        // Arrange
        let first = DescribeListener::bind(0).await.unwrap();

        // Act
        let second = DescribeListener::bind(first.port()).await;

        // Assert
        assert!(matches!(second, Err(ClientError::BindFailed { .. })));
    }
}
