//! Infrastructure layer for the streaming server.
//!
//! Contains the OS-facing adapters: control and data sockets, media files,
//! and configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `vstream_core`, but MUST NOT be imported by the `application` layer.

pub mod media;
pub mod network;
pub mod storage;
