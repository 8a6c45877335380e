//! Latest-frame cache file.
//!
//! Each delivered frame overwrites `cache-<session>.jpg` in the cache
//! directory, so an external viewer can poll one path for the current image.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to write frame cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove frame cache {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writer for one session's cache file.
#[derive(Debug, Clone)]
pub struct FrameCache {
    path: PathBuf,
}

impl FrameCache {
    pub fn new(dir: &Path, session_id: u64) -> Self {
        Self {
            path: dir.join(format!("cache-{session_id}.jpg")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the cached image with `frame`.
    pub async fn write(&self, frame: &[u8]) -> Result<(), CacheError> {
        tokio::fs::write(&self.path, frame)
            .await
            .map_err(|source| CacheError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Deletes the cache file.  A file that was never written is not an error.
    pub async fn remove(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
