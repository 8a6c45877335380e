//! Application layer for the client.
//!
//! - **`frame_filter`** – The freshness policy and loss accounting applied
//!   to every received data packet.  Pure; no I/O.

pub mod frame_filter;
