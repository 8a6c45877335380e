//! Network infrastructure for the streaming server.
//!
//! # Sub-modules
//!
//! - **`listener`** – Binds the control port and spawns one worker per
//!   accepted connection until the shutdown flag clears.
//!
//! - **`worker`** – The per-connection control engine: parses requests,
//!   applies the state table, replies, and starts/stops the send loop.
//!
//! - **`sender`** – The data send loop, one task per play.
//!
//! - **`describe`** – Pushes DESCRIBE output to the client's side-channel
//!   listener.

pub mod describe;
pub mod listener;
pub mod sender;
pub mod worker;

use std::net::SocketAddr;

use thiserror::Error;

use crate::infrastructure::storage::config::ConfigError;

/// Errors surfaced by the server's network layer.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The control listener could not be bound.
    #[error("failed to bind control listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Pushing a description to the client failed.
    #[error("failed to push description to {addr}: {source}")]
    Describe {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The configuration does not describe a usable listener.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Any other socket error.
    #[error("network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub use listener::{run_server, ControlServer};
pub use sender::{run_send_loop, SendOutcome, SendSettings};
pub use worker::{serve_connection, Worker};
