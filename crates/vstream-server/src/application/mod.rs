//! Application layer for the streaming server.
//!
//! # Sub-modules
//!
//! - **`dispatch`** – Decides, from the current playback state, whether an
//!   incoming request is served or silently ignored, and mints session ids.
//!
//! - **`frame_source`** – The `FrameSource` / `MediaLibrary` traits the
//!   control engine and send loop are written against.
//!
//! This layer performs no socket or file I/O.

pub mod dispatch;
pub mod frame_source;
