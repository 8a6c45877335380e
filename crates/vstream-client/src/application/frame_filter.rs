//! Freshness filter for received frames.
//!
//! Data packets may arrive late, twice, or not at all.  A packet is accepted
//! only if its sequence number is strictly greater than the highest one
//! accepted so far; everything else is discarded as stale.  Gaps between
//! consecutive accepted numbers are counted as lost frames.
//!
//! ```text
//! arrivals: 1 2 4 4 3 6
//! accepted: 1 2 4     6      lost: 1 (3, counted at 4) + 1 (5) = 2
//! stale:          4 3
//! ```
//!
//! Sequence wrap-around at 65536 is not handled; after a wrap every packet
//! is stale until the statistics are reset by STOP.

use std::time::Duration;

use vstream_core::StreamStats;

/// Result of offering one packet to the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Accepted; `lost` frames were skipped since the previous one.
    Fresh { lost: u64 },
    /// Not newer than the highest accepted frame; discarded.
    Stale,
}

/// Offers a packet to the filter, updating `stats` in place.
pub fn admit(
    stats: &mut StreamStats,
    sequence_number: u16,
    payload_len: usize,
    latency: Duration,
) -> Admission {
    if sequence_number <= stats.highest_frame {
        stats.stale_discarded += 1;
        return Admission::Stale;
    }

    let lost = u64::from(sequence_number - stats.highest_frame - 1);
    stats.frames_lost += lost;
    stats.highest_frame = sequence_number;
    stats.frames_received += 1;
    stats.bytes_received += payload_len as u64;
    stats.elapsed += latency;
    Admission::Fresh { lost }
}
