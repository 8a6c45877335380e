//! Network layer for the client.
//!
//! - **`control`** – The control engine: one TCP connection, request/reply
//!   correlation, and the side effects of each accepted transition.
//! - **`receiver`** – The per-play data receive loop.
//! - **`describe`** – The one-shot listener for DESCRIBE's pushed text.

pub mod control;
pub mod describe;
pub mod receiver;

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use vstream_core::session::SessionError;
use vstream_core::{Method, StatusCode};

pub use control::ClientSession;
pub use describe::DescribeListener;
pub use receiver::{run_receive_loop, DeliveredFrame, RecvOutcome};

/// Errors from client network operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to server at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    NotAllowed(#[from] SessionError),

    #[error("no reply to {method} within {timeout:?}")]
    ReplyTimeout { method: Method, timeout: Duration },

    #[error("server rejected {method} with {status}")]
    Rejected { method: Method, status: StatusCode },

    #[error("control connection closed by server")]
    ConnectionClosed,

    #[error("no description received within {0:?}")]
    DescribeTimeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
