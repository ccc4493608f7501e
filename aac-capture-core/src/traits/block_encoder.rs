use crate::models::audio_format::AudioFormat;
use crate::models::error::CaptureError;

/// Parameters handed to an [`EncoderFactory`] once the input format is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub input_format: AudioFormat,
    /// Target bitrate in bits per second.
    pub bitrate: u32,
    /// Requested sample periods per output packet.
    pub frames_per_packet: u32,
}

/// A block AAC encoder: one fixed-size PCM frame in, one raw access unit out.
///
/// Dropping the encoder releases its native resources.
pub trait BlockEncoder: Send {
    /// Sample periods consumed per call. Fixed for the encoder's lifetime.
    fn frames_per_packet(&self) -> u32;

    /// Encode exactly one frame of `frames_per_packet × bytes_per_frame` bytes
    /// into a raw AAC payload (no ADTS header).
    ///
    /// An empty payload means the encoder is still priming and produced no
    /// access unit for this frame.
    fn encode_frame(&mut self, pcm: &[u8]) -> Result<Vec<u8>, CaptureError>;
}

/// Creates converter contexts for an encode session.
pub trait EncoderFactory: Send + Sync {
    fn create(&self, settings: &EncoderSettings) -> Result<Box<dyn BlockEncoder>, CaptureError>;
}

impl<F> EncoderFactory for F
where
    F: Fn(&EncoderSettings) -> Result<Box<dyn BlockEncoder>, CaptureError> + Send + Sync,
{
    fn create(&self, settings: &EncoderSettings) -> Result<Box<dyn BlockEncoder>, CaptureError> {
        self(settings)
    }
}
