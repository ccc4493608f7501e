use super::audio_format::AudioFormat;

/// Raw PCM delivered by one hardware callback.
///
/// Produced once per delivery and handed to a single consumer; never mutated
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmChunk {
    pub bytes: Vec<u8>,
    pub frame_count: u32,
    /// Presentation timestamp in nanoseconds.
    pub presentation_timestamp: i64,
    pub source_format: AudioFormat,
}

impl PcmChunk {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Rational media time, `value / timescale` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: u32,
}

impl MediaTime {
    pub const NANOS_PER_SEC: u32 = 1_000_000_000;

    pub fn new(value: i64, timescale: u32) -> Self {
        Self { value, timescale }
    }

    /// Converts to nanoseconds, saturating at the `i64` range. A zero
    /// timescale yields zero.
    pub fn as_nanos(&self) -> i64 {
        if self.timescale == 0 {
            return 0;
        }
        let nanos = self.value as i128 * Self::NANOS_PER_SEC as i128 / self.timescale as i128;
        nanos.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn as_secs_f64(&self) -> f64 {
        if self.timescale == 0 {
            return 0.0;
        }
        self.value as f64 / self.timescale as f64
    }
}

/// Timing attached to an encoded packet. Audio has no reordering, so the
/// decode timestamp always equals the presentation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketTiming {
    pub duration: MediaTime,
    /// Presentation timestamp in nanoseconds.
    pub presentation_timestamp: i64,
}

impl PacketTiming {
    pub fn decode_timestamp(&self) -> i64 {
        self.presentation_timestamp
    }
}

/// One ADTS-framed AAC access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AacPacket {
    pub adts_header: [u8; 7],
    pub payload: Vec<u8>,
    pub timing: PacketTiming,
}

impl AacPacket {
    /// Total size of the ADTS frame (header plus payload).
    pub fn frame_len(&self) -> usize {
        self.adts_header.len() + self.payload.len()
    }

    /// `adts_header ++ payload`, ready to append to an `.aac` byte stream.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.frame_len());
        out.extend_from_slice(&self.adts_header);
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn packet_duration_in_seconds() {
        let duration = MediaTime::new(1024, 44100);
        assert_relative_eq!(duration.as_secs_f64(), 0.023_219_954, epsilon = 1e-9);
        assert_eq!(duration.as_nanos(), 23_219_954);
    }

    #[test]
    fn zero_timescale_is_zero() {
        assert_eq!(MediaTime::new(5, 0).as_nanos(), 0);
        assert_eq!(MediaTime::new(5, 0).as_secs_f64(), 0.0);
    }

    #[test]
    fn packet_bytes_are_header_then_payload() {
        let packet = AacPacket {
            adts_header: [0xFF, 0xF9, 0x50, 0x80, 0x01, 0x1F, 0xFC],
            payload: vec![0x21, 0x10],
            timing: PacketTiming {
                duration: MediaTime::new(1024, 44100),
                presentation_timestamp: 0,
            },
        };
        assert_eq!(packet.frame_len(), 9);
        assert_eq!(&packet.to_bytes()[..7], &packet.adts_header);
        assert_eq!(&packet.to_bytes()[7..], &[0x21, 0x10]);
        assert_eq!(packet.timing.decode_timestamp(), 0);
    }
}
