//! Client configuration types.
//!
//! [`ClientConfig`] is built once at startup from CLI arguments (see
//! `main.rs`) or from [`Default`] in tests, then handed to the session.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// All runtime configuration for one client session.
///
/// # Example
///
/// ```rust
/// use vstream_client::domain::ClientConfig;
///
/// let cfg = ClientConfig::default();
/// assert_eq!(cfg.server_addr.port(), 8554);
/// assert_eq!(cfg.data_port, 25000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// The server's control address.
    pub server_addr: SocketAddr,
    /// Local UDP port advertised in SETUP.  `0` picks a free port.
    pub data_port: u16,
    /// Local TCP port the DESCRIBE listener binds.  `0` picks a free port.
    pub describe_port: u16,
    /// Bounded wait for one datagram before re-checking the stop signal.
    pub recv_timeout: Duration,
    /// How long a request waits for its reply.
    pub reply_timeout: Duration,
    /// How long DESCRIBE waits for the pushed description.
    pub describe_timeout: Duration,
    /// Capacity of the delivered-frame channel.
    pub frame_buffer: usize,
}

impl Default for ClientConfig {
    /// | Field            | Default          |
    /// |------------------|------------------|
    /// | server_addr      | `127.0.0.1:8554` |
    /// | data_port        | `25000`          |
    /// | describe_port    | `25001`          |
    /// | recv_timeout     | 500 ms           |
    /// | reply_timeout    | 5 s              |
    /// | describe_timeout | 2 s              |
    /// | frame_buffer     | 64               |
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8554)),
            data_port: 25000,
            describe_port: 25001,
            recv_timeout: Duration::from_millis(500),
            reply_timeout: Duration::from_secs(5),
            describe_timeout: Duration::from_secs(2),
            frame_buffer: 64,
        }
    }
}
