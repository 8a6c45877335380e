//! Receive-side statistics shared between the data loop and its control engine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Counters accumulated by one receive loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamStats {
    /// Highest frame sequence number accepted so far (0 before the first).
    pub highest_frame: u16,
    /// Frames accepted as fresh.
    pub frames_received: u64,
    /// Frames inferred lost from sequence gaps.
    pub frames_lost: u64,
    /// Datagrams discarded because they were not newer than `highest_frame`.
    pub stale_discarded: u64,
    /// Total payload bytes of accepted frames.
    pub bytes_received: u64,
    /// Accumulated time spent receiving accepted frames.
    pub elapsed: Duration,
}

impl StreamStats {
    /// `lost / (lost + received)`, or 0.0 when nothing has been seen.
    pub fn loss_rate(&self) -> f64 {
        let total = self.frames_lost + self.frames_received;
        if total == 0 {
            return 0.0;
        }
        self.frames_lost as f64 / total as f64
    }

    /// Payload bytes per second over [`elapsed`](Self::elapsed), or 0.0.
    pub fn throughput_bps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes_received as f64 / secs
    }
}

/// Cloneable, mutex-guarded handle to a [`StreamStats`].
///
/// The data task writes through [`update`](Self::update); the control task
/// reads a copy with [`snapshot`](Self::snapshot) once the data task has
/// finished.
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    inner: Arc<Mutex<StreamStats>>,
}

impl StatsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with exclusive access to the counters.
    pub fn update<R>(&self, f: impl FnOnce(&mut StreamStats) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> StreamStats {
        *self.lock()
    }

    /// Zeroes every counter, including the highest accepted frame.
    pub fn reset(&self) {
        *self.lock() = StreamStats::default();
    }

    fn lock(&self) -> MutexGuard<'_, StreamStats> {
        // Counters stay meaningful even if a writer panicked mid-update.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
