//! AAC-LC block encoder backed by libfdk-aac.

use fdk_aac::enc::{AudioObjectType, BitRate, ChannelMode, Encoder, EncoderParams, Transport};

use aac_capture_core::models::error::CaptureError;
use aac_capture_core::traits::block_encoder::{BlockEncoder, EncoderFactory, EncoderSettings};

/// Sample periods per AAC-LC access unit.
pub const AAC_LC_FRAME_LEN: u32 = 1024;

/// Worst-case raw access unit size per channel (6144 bits, rounded up).
const MAX_OUTPUT_PER_CHANNEL: usize = 8192;

/// One libfdk-aac context producing raw (headerless) AAC-LC access units.
pub struct FdkAacEncoder {
    encoder: Encoder,
    samples: Vec<i16>,
    output: Vec<u8>,
}

// SAFETY: the encoder handle is only ever used through `&mut self`, so it is
// never touched from two threads at once.
unsafe impl Send for FdkAacEncoder {}

impl FdkAacEncoder {
    pub fn new(settings: &EncoderSettings) -> Result<Self, CaptureError> {
        let format = settings.input_format;
        if format.bit_depth != 16 {
            return Err(CaptureError::Encode(format!(
                "encoder input must be 16-bit PCM, got {}-bit",
                format.bit_depth
            )));
        }
        if settings.frames_per_packet != AAC_LC_FRAME_LEN {
            log::warn!(
                "AAC-LC packets are {} frames, ignoring requested {}",
                AAC_LC_FRAME_LEN,
                settings.frames_per_packet
            );
        }

        let params = EncoderParams {
            bit_rate: BitRate::Cbr(settings.bitrate),
            sample_rate: format.sample_rate,
            transport: Transport::Raw,
            audio_object_type: AudioObjectType::Mpeg4LowComplexity,
            channels: match format.channels {
                1 => ChannelMode::Mono,
                2 => ChannelMode::Stereo,
                n => return Err(CaptureError::Encode(format!("unsupported channel count {}", n))),
            },
        };
        let encoder =
            Encoder::new(params).map_err(|e| CaptureError::Encode(format!("failed to create encoder: {:?}", e)))?;

        let channels = format.channels as usize;
        Ok(Self {
            encoder,
            samples: Vec::with_capacity(AAC_LC_FRAME_LEN as usize * channels),
            output: vec![0u8; MAX_OUTPUT_PER_CHANNEL * channels],
        })
    }
}

impl BlockEncoder for FdkAacEncoder {
    fn frames_per_packet(&self) -> u32 {
        AAC_LC_FRAME_LEN
    }

    fn encode_frame(&mut self, pcm: &[u8]) -> Result<Vec<u8>, CaptureError> {
        self.samples.clear();
        self.samples
            .extend(pcm.chunks_exact(2).map(|b| i16::from_ne_bytes([b[0], b[1]])));

        let info = self
            .encoder
            .encode(&self.samples, &mut self.output)
            .map_err(|e| CaptureError::Encode(format!("encode failed: {:?}", e)))?;

        Ok(self.output[..info.output_size].to_vec())
    }
}

/// Creates an [`FdkAacEncoder`] per encode session.
#[derive(Debug, Clone, Copy, Default)]
pub struct FdkEncoderFactory;

impl EncoderFactory for FdkEncoderFactory {
    fn create(&self, settings: &EncoderSettings) -> Result<Box<dyn BlockEncoder>, CaptureError> {
        Ok(Box::new(FdkAacEncoder::new(settings)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aac_capture_core::models::audio_format::AudioFormat;

    fn settings(channels: u8) -> EncoderSettings {
        EncoderSettings {
            input_format: AudioFormat::new(44100, 16, channels),
            bitrate: 112_000,
            frames_per_packet: 1024,
        }
    }

    #[test]
    fn rejects_surround_input() {
        assert!(matches!(FdkAacEncoder::new(&settings(6)), Err(CaptureError::Encode(_))));
    }

    #[test]
    fn rejects_float_input() {
        let mut s = settings(2);
        s.input_format.bit_depth = 32;
        assert!(FdkAacEncoder::new(&s).is_err());
    }

    #[test]
    fn silence_encodes_to_raw_access_units() {
        let mut encoder = FdkEncoderFactory.create(&settings(2)).unwrap();
        let frame = vec![0u8; 1024 * 4];

        let payloads: Vec<Vec<u8>> = (0..8).map(|_| encoder.encode_frame(&frame).unwrap()).collect();

        // priming delay yields empty output before the first access unit
        let produced: Vec<&Vec<u8>> = payloads.iter().filter(|p| !p.is_empty()).collect();
        assert!(!produced.is_empty());
        // raw transport: no ADTS sync word
        assert!(produced.iter().all(|p| !(p.len() >= 2 && p[0] == 0xFF && p[1] & 0xF0 == 0xF0)));
    }
}
