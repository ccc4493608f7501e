use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::audio_format::AudioFormat;
use super::error::CaptureError;

/// What the encoder driver does when a single frame fails to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFailurePolicy {
    /// Drop the frame, report the error once, keep encoding.
    #[default]
    ContinueOnError,
    /// Report the error and move the encoder into the sticky error state.
    AbortSession,
}

/// Execution context on which packet callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketDelivery {
    /// Synchronously on the encode worker, right after the frame is encoded.
    #[default]
    EncodeWorker,
    /// On the callback dispatcher thread, decoupled from encoding.
    Dispatcher,
}

/// Configuration for a capture + encode session.
///
/// Values are taken as given; an unsupported sample rate simply produces the
/// forbidden ADTS sampling-frequency index (15).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfiguration {
    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// PCM bit depth (default: 16).
    pub bit_depth: u8,

    /// Interleaved channel count (default: 2).
    pub channels: u8,

    /// Target AAC bitrate in bits per second (default: 112000).
    pub bitrate: u32,

    /// PCM sample periods per AAC packet (default: 1024).
    pub frames_per_packet: u32,

    /// Preferred hardware I/O buffer size in frames; `None` lets the device decide.
    pub io_buffer_frames: Option<u32>,

    /// Capacity of the capture → encode queue in chunks (default: 256).
    pub queue_capacity: usize,

    pub frame_failure_policy: FrameFailurePolicy,

    pub packet_delivery: PacketDelivery,
}

impl SessionConfiguration {
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.bit_depth, self.channels)
    }

    /// Byte length of one encoder input frame (`frames_per_packet × bytes_per_frame`).
    pub fn encode_frame_len(&self) -> usize {
        self.audio_format().bytes_for_frames(self.frames_per_packet)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        serde_json::from_str(json)
            .map_err(|e| CaptureError::Configuration(format!("invalid session configuration: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            bit_depth: 16,
            channels: 2,
            bitrate: 112_000,
            frames_per_packet: 1024,
            io_buffer_frames: None,
            queue_capacity: 256,
            frame_failure_policy: FrameFailurePolicy::ContinueOnError,
            packet_delivery: PacketDelivery::EncodeWorker,
        }
    }
}
