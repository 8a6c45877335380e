//! In-memory media for demos and tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::frame_source::{FrameSource, FrameSourceError, MediaLibrary};

/// A cursor over a shared list of frames.
#[derive(Debug, Clone)]
pub struct MemoryFrameSource {
    frames: Arc<Vec<Vec<u8>>>,
    frame_index: u32,
}

impl MemoryFrameSource {
    pub fn new(frames: Arc<Vec<Vec<u8>>>) -> Self {
        Self {
            frames,
            frame_index: 0,
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameSourceError> {
        let Some(frame) = self.frames.get(self.frame_index as usize) else {
            return Ok(None);
        };
        self.frame_index += 1;
        Ok(Some(frame.clone()))
    }

    fn frame_index(&self) -> u32 {
        self.frame_index
    }
}

/// A [`MediaLibrary`] backed by named in-memory clips.
#[derive(Debug, Clone, Default)]
pub struct MemoryLibrary {
    clips: HashMap<String, Arc<Vec<Vec<u8>>>>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `frames` under `name`, replacing any previous clip.
    pub fn with_clip(mut self, name: impl Into<String>, frames: Vec<Vec<u8>>) -> Self {
        self.clips.insert(name.into(), Arc::new(frames));
        self
    }
}

impl MediaLibrary for MemoryLibrary {
    fn open(&self, name: &str) -> Result<Box<dyn FrameSource>, FrameSourceError> {
        self.clips
            .get(name)
            .map(|frames| Box::new(MemoryFrameSource::new(Arc::clone(frames))) as Box<dyn FrameSource>)
            .ok_or_else(|| FrameSourceError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_yields_frames_then_none() {
        let mut source = MemoryFrameSource::new(Arc::new(vec![vec![1], vec![2, 2]]));
        assert_eq!(source.next_frame().unwrap(), Some(vec![1]));
        assert_eq!(source.frame_index(), 1);
        assert_eq!(source.next_frame().unwrap(), Some(vec![2, 2]));
        assert_eq!(source.next_frame().unwrap(), None);
        assert_eq!(source.frame_index(), 2);
    }

    #[test]
    fn test_library_opens_independent_cursors() {
        // Arrange
        let library = MemoryLibrary::new().with_clip("a", vec![vec![0xAA]]);

        // Act
        let mut first = library.open("a").unwrap();
        first.next_frame().unwrap();
        let second = library.open("a").unwrap();

        // Assert
        assert_eq!(first.frame_index(), 1);
        assert_eq!(second.frame_index(), 0);
    }

    #[test]
    fn test_unknown_clip_is_not_found() {
        let library = MemoryLibrary::new();
        assert!(matches!(
            library.open("missing"),
            Err(FrameSourceError::NotFound(_))
        ));
    }
}
