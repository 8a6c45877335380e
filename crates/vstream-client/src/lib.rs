//! # vstream-client
//!
//! Client side of vstream: drives a session over the control connection and
//! receives frames on the data channel.
//!
//! - **`domain`** – [`ClientConfig`](domain::ClientConfig).
//! - **`application`** – The freshness filter that decides which received
//!   packets are delivered and how many frames were lost.
//! - **`infrastructure`** – The control engine
//!   ([`ClientSession`](infrastructure::network::ClientSession)), the receive
//!   loop, the DESCRIBE listener, and the frame cache file.

pub mod application;
pub mod domain;
pub mod infrastructure;
