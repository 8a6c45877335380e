//! Concrete frame sources.
//!
//! - **`mjpeg`** – Length-prefixed MJPEG files under a media root directory.
//! - **`memory`** – Named clips held in memory.

pub mod memory;
pub mod mjpeg;

pub use memory::{MemoryFrameSource, MemoryLibrary};
pub use mjpeg::{MjpegFile, MjpegLibrary};
