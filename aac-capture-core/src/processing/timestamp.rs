//! Hardware timebase → presentation time conversion.
//!
//! Hosts count time in monotonic ticks whose length is `numer / denom`
//! nanoseconds. Every PCM chunk is stamped by converting the tick count
//! delivered with it; presentation and decode timestamps are identical for
//! audio.

use crate::models::media::MediaTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    pub numer: u32,
    pub denom: u32,
}

impl Timebase {
    pub fn new(numer: u32, denom: u32) -> Self {
        Self { numer, denom }
    }

    /// Ticks that already are nanoseconds.
    pub fn nanoseconds() -> Self {
        Self::new(1, 1)
    }

    /// Convert a tick count to nanoseconds, saturating at `i64::MAX`.
    /// A zero denominator is treated as one.
    pub fn ticks_to_nanos(&self, ticks: u64) -> i64 {
        let denom = self.denom.max(1) as u128;
        let nanos = ticks as u128 * self.numer as u128 / denom;
        nanos.min(i64::MAX as u128) as i64
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Self::nanoseconds()
    }
}

/// Duration of one sample period: `1 / sample_rate` seconds.
pub fn frame_duration(sample_rate: u32) -> MediaTime {
    MediaTime::new(1, sample_rate)
}

/// Duration of one encoded packet of `frames_per_packet` sample periods.
pub fn packet_duration(frames_per_packet: u32, sample_rate: u32) -> MediaTime {
    MediaTime::new(frames_per_packet as i64, sample_rate)
}
