use serde::{Deserialize, Serialize};

/// Linear-PCM stream description negotiated for a capture/encode session.
///
/// Samples are signed, packed, interleaved and native-endian. Fixed once a
/// session is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bit_depth: u8,
    pub channels: u8,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, bit_depth: u8, channels: u8) -> Self {
        Self {
            sample_rate,
            bit_depth,
            channels,
        }
    }

    /// Bytes in one sample period across all channels.
    pub fn bytes_per_frame(&self) -> usize {
        (self.bit_depth as usize / 8) * self.channels as usize
    }

    /// Byte length of `frames` sample periods.
    pub fn bytes_for_frames(&self, frames: u32) -> usize {
        self.bytes_per_frame() * frames as usize
    }

    /// Number of whole sample periods contained in `bytes`.
    pub fn frames_in(&self, bytes: usize) -> u32 {
        match self.bytes_per_frame() {
            0 => 0,
            bpf => (bytes / bpf) as u32,
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::new(44100, 16, 2)
    }
}
