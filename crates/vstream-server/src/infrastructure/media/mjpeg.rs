//! Length-prefixed MJPEG file source.
//!
//! File layout: repeated records of a 5-byte ASCII decimal length followed by
//! that many bytes of JPEG data.
//!
//! ```text
//! "01234" <1234 bytes of JPEG> "00987" <987 bytes of JPEG> ...
//! ```

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::application::frame_source::{FrameSource, FrameSourceError, MediaLibrary};

/// Width of the ASCII length prefix before every frame.
pub const LENGTH_PREFIX_LEN: usize = 5;

/// A cursor over one MJPEG file.
#[derive(Debug)]
pub struct MjpegFile {
    path: PathBuf,
    reader: BufReader<File>,
    frame_index: u32,
}

impl MjpegFile {
    /// Opens `path` positioned before the first frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameSourceError::NotFound`] if the file does not exist, or
    /// [`FrameSourceError::Io`] for any other open failure.
    pub fn open(path: &Path) -> Result<Self, FrameSourceError> {
        let file = File::open(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => FrameSourceError::NotFound(path.display().to_string()),
            _ => FrameSourceError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            frame_index: 0,
        })
    }

    fn io_error(&self, source: std::io::Error) -> FrameSourceError {
        FrameSourceError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> FrameSourceError {
        FrameSourceError::Malformed {
            name: self.path.display().to_string(),
            frame: self.frame_index + 1,
            reason: reason.into(),
        }
    }

    /// Reads the length prefix.  `Ok(None)` means a clean end of file.
    fn read_length(&mut self) -> Result<Option<usize>, FrameSourceError> {
        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        let mut filled = 0;
        while filled < LENGTH_PREFIX_LEN {
            match self.reader.read(&mut prefix[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(self.malformed("truncated length prefix")),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(self.io_error(e)),
            }
        }

        let text = std::str::from_utf8(&prefix)
            .map_err(|_| self.malformed("length prefix is not ASCII"))?;
        text.trim()
            .parse()
            .map(Some)
            .map_err(|_| self.malformed(format!("invalid length prefix {text:?}")))
    }
}

impl FrameSource for MjpegFile {
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameSourceError> {
        let Some(len) = self.read_length()? else {
            debug!("end of {}", self.path.display());
            return Ok(None);
        };

        let mut frame = vec![0u8; len];
        self.reader.read_exact(&mut frame).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => self.malformed(format!("frame body shorter than {len} bytes")),
            _ => self.io_error(e),
        })?;

        self.frame_index += 1;
        Ok(Some(frame))
    }

    fn frame_index(&self) -> u32 {
        self.frame_index
    }
}

/// Resolves media names to files under a root directory.
#[derive(Debug, Clone)]
pub struct MjpegLibrary {
    root: PathBuf,
}

impl MjpegLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `name` onto the root, refusing absolute paths and `..`.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            .then(|| self.root.join(relative))
    }
}

impl MediaLibrary for MjpegLibrary {
    fn open(&self, name: &str) -> Result<Box<dyn FrameSource>, FrameSourceError> {
        let path = self
            .resolve(name)
            .ok_or_else(|| FrameSourceError::NotFound(name.to_string()))?;
        Ok(Box::new(MjpegFile::open(&path)?))
    }
}
