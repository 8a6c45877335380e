//! Frame source abstractions.
//!
//! The control engine and the send loop only see these traits; concrete
//! sources (MJPEG files, in-memory clips) live in
//! `crate::infrastructure::media`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// Errors raised while opening or reading a frame source.
#[derive(Debug, Error)]
pub enum FrameSourceError {
    /// No media with this name exists.
    #[error("media not found: {0}")]
    NotFound(String),

    /// The media exists but could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The media is readable but a frame record is corrupt.
    #[error("malformed frame {frame} in {name}: {reason}")]
    Malformed {
        name: String,
        frame: u32,
        reason: String,
    },

    /// The blocking read task panicked or was cancelled.
    #[error("frame read task failed: {0}")]
    ReadTask(String),
}

/// A stateful cursor over the frames of one media item.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSource: Send {
    /// Returns the next frame payload, or `Ok(None)` at end of sequence.
    ///
    /// # Errors
    ///
    /// Returns [`FrameSourceError`] if the underlying media cannot be read.
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameSourceError>;

    /// 1-based number of frames produced so far (0 before the first).
    fn frame_index(&self) -> u32;
}

/// Resolves media names to fresh frame sources.
#[cfg_attr(test, mockall::automock)]
pub trait MediaLibrary: Send + Sync {
    /// Opens `name` positioned before its first frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameSourceError::NotFound`] if `name` does not exist.
    fn open(&self, name: &str) -> Result<Box<dyn FrameSource>, FrameSourceError>;
}

/// A frame source shared between a control worker and its send loop.
///
/// The lock is only held for one `next_frame` call and never across an
/// `.await`.  Async callers go through [`SharedSource::read_next`], which runs
/// the read on the blocking pool.
#[derive(Clone)]
pub struct SharedSource {
    inner: Arc<Mutex<Box<dyn FrameSource>>>,
}

impl SharedSource {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(source)),
        }
    }

    /// Pulls the next frame together with its 1-based index.
    ///
    /// # Errors
    ///
    /// Propagates the source's read error.
    pub fn next_frame(&self) -> Result<Option<(u32, Vec<u8>)>, FrameSourceError> {
        let mut source = self.lock();
        let frame = source.next_frame()?;
        Ok(frame.map(|payload| (source.frame_index(), payload)))
    }

    /// [`SharedSource::next_frame`] on tokio's blocking pool, so file reads
    /// never stall a runtime worker.
    ///
    /// # Errors
    ///
    /// Propagates the source's read error, or
    /// [`FrameSourceError::ReadTask`] if the blocking task did not complete.
    pub async fn read_next(&self) -> Result<Option<(u32, Vec<u8>)>, FrameSourceError> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.next_frame())
            .await
            .map_err(|e| FrameSourceError::ReadTask(e.to_string()))?
    }

    /// Swaps in a freshly opened source, resetting the cursor.
    pub fn replace(&self, source: Box<dyn FrameSource>) {
        *self.lock() = source;
    }

    pub fn frame_index(&self) -> u32 {
        self.lock().frame_index()
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn FrameSource>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SharedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSource")
            .field("frame_index", &self.frame_index())
            .finish()
    }
}
