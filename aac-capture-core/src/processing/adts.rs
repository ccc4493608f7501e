//! ADTS (Audio Data Transport Stream) header synthesis and parsing.
//!
//! Each AAC access unit is prefixed with a 7-byte header (no CRC variant).
//!
//! Layout, MSB first:
//! ```text
//! AAAAAAAA AAAABCCD EEFFFFGH HHIJKLMM MMMMMMMM MMMOOOOO OOOOOOPP
//!
//! A  12  sync word, all ones
//! B   1  MPEG version (0 = MPEG-4, 1 = MPEG-2)
//! C   2  layer, always 0
//! D   1  protection absent (1 = no CRC)
//! E   2  profile, MPEG-4 audio object type minus 1
//! F   4  sampling frequency index (15 is forbidden)
//! G   1  private bit
//! H   3  channel configuration
//! I   1  originality
//! J   1  home
//! K   1  copyright id bit
//! L   1  copyright id start
//! M  13  frame length, header included
//! O  11  buffer fullness (0x7FF = variable bitrate)
//! P   2  raw data blocks in frame minus 1
//! ```

use thiserror::Error;

pub const ADTS_HEADER_LEN: usize = 7;

/// Largest value the 13-bit frame-length field can carry.
pub const MAX_FRAME_LENGTH: usize = 0x1FFF;

/// Largest payload that still fits the frame-length field.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LENGTH - ADTS_HEADER_LEN;

/// Buffer fullness value signalling a variable-bitrate stream.
pub const VBR_BUFFER_FULLNESS: u16 = 0x7FF;

/// Sampling-frequency index for rates outside the MPEG-4 table.
pub const FORBIDDEN_SAMPLE_RATE_INDEX: u8 = 15;

const SYNC_WORD: u16 = 0xFFF;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdtsError {
    #[error("payload of {0} bytes does not fit a 13-bit ADTS frame length")]
    PayloadTooLarge(usize),

    #[error("need 7 bytes for an ADTS header, got {0}")]
    Truncated(usize),

    #[error("missing ADTS sync word")]
    BadSyncWord,
}

/// Value of the MPEG version (ID) bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg4 = 0,
    Mpeg2 = 1,
}

/// MPEG-4 audio object types expressible in the 2-bit ADTS profile field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioObjectType {
    AacMain = 1,
    AacLc = 2,
    AacSsr = 3,
    AacLtp = 4,
}

impl AudioObjectType {
    /// Value stored in the ADTS profile field.
    pub fn profile(self) -> u8 {
        self as u8 - 1
    }

    fn from_profile(profile: u8) -> Self {
        match profile & 0b11 {
            0 => Self::AacMain,
            1 => Self::AacLc,
            2 => Self::AacSsr,
            _ => Self::AacLtp,
        }
    }
}

/// Sampling-frequency index for `sample_rate` in Hz; 15 when unsupported.
pub fn sample_rate_index(sample_rate: u32) -> u8 {
    SAMPLE_RATES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|i| i as u8)
        .unwrap_or(FORBIDDEN_SAMPLE_RATE_INDEX)
}

/// Sample rate in Hz for a sampling-frequency index, if the index is assigned.
pub fn sample_rate_for_index(index: u8) -> Option<u32> {
    SAMPLE_RATES.get(index as usize).copied()
}

/// Channel configuration for a channel count. Counts without a standard
/// configuration map to 0 (layout carried in-band).
pub fn channel_configuration(channels: u32) -> u8 {
    match channels {
        0..=6 => channels as u8,
        8 => 7,
        _ => 0,
    }
}

/// Decoded or to-be-encoded header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsFields {
    pub mpeg_version: MpegVersion,
    pub protection_absent: bool,
    pub object_type: AudioObjectType,
    pub sample_rate_index: u8,
    pub channel_configuration: u8,
    /// Header plus payload, in bytes.
    pub frame_length: u16,
    pub buffer_fullness: u16,
    /// Raw data blocks in the frame minus one.
    pub raw_data_blocks: u8,
}

impl AdtsFields {
    /// AAC-LC, single raw data block, variable bitrate, no CRC.
    pub fn aac_lc(channels: u32, sample_rate: u32, payload_len: usize) -> Result<Self, AdtsError> {
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(AdtsError::PayloadTooLarge(payload_len));
        }
        Ok(Self::aac_lc_saturating(channels, sample_rate, payload_len))
    }

    /// As [`AdtsFields::aac_lc`], clamping the frame length at [`MAX_FRAME_LENGTH`].
    pub fn aac_lc_saturating(channels: u32, sample_rate: u32, payload_len: usize) -> Self {
        Self {
            mpeg_version: MpegVersion::Mpeg2,
            protection_absent: true,
            object_type: AudioObjectType::AacLc,
            sample_rate_index: sample_rate_index(sample_rate),
            channel_configuration: channel_configuration(channels),
            frame_length: (ADTS_HEADER_LEN + payload_len.min(MAX_PAYLOAD_LEN)) as u16,
            buffer_fullness: VBR_BUFFER_FULLNESS,
            raw_data_blocks: 0,
        }
    }

    pub fn with_mpeg_version(mut self, version: MpegVersion) -> Self {
        self.mpeg_version = version;
        self
    }

    pub fn payload_len(&self) -> usize {
        (self.frame_length as usize).saturating_sub(ADTS_HEADER_LEN)
    }

    /// Pack the fields into the 7-byte wire header. Out-of-range field values
    /// are masked to their bit widths.
    pub fn to_bytes(&self) -> [u8; ADTS_HEADER_LEN] {
        let profile = self.object_type.profile();
        let sfi = self.sample_rate_index & 0x0F;
        let chan = self.channel_configuration & 0x07;
        let len = self.frame_length & 0x1FFF;
        let fullness = self.buffer_fullness & 0x07FF;

        [
            (SYNC_WORD >> 4) as u8,
            ((SYNC_WORD & 0x0F) as u8) << 4
                | (self.mpeg_version as u8) << 3
                | (self.protection_absent as u8),
            profile << 6 | sfi << 2 | chan >> 2,
            (chan & 0b11) << 6 | (len >> 11) as u8,
            (len >> 3) as u8,
            ((len & 0b111) as u8) << 5 | (fullness >> 6) as u8,
            ((fullness & 0x3F) as u8) << 2 | (self.raw_data_blocks & 0b11),
        ]
    }

    /// Decode the fixed and variable header from the first 7 bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, AdtsError> {
        if bytes.len() < ADTS_HEADER_LEN {
            return Err(AdtsError::Truncated(bytes.len()));
        }
        let sync = (bytes[0] as u16) << 4 | (bytes[1] >> 4) as u16;
        if sync != SYNC_WORD {
            return Err(AdtsError::BadSyncWord);
        }

        let mpeg_version = if bytes[1] & 0b1000 != 0 {
            MpegVersion::Mpeg2
        } else {
            MpegVersion::Mpeg4
        };
        let frame_length = ((bytes[3] & 0b11) as u16) << 11
            | (bytes[4] as u16) << 3
            | (bytes[5] >> 5) as u16;
        let buffer_fullness = ((bytes[5] & 0x1F) as u16) << 6 | (bytes[6] >> 2) as u16;

        Ok(Self {
            mpeg_version,
            protection_absent: bytes[1] & 0b1 != 0,
            object_type: AudioObjectType::from_profile(bytes[2] >> 6),
            sample_rate_index: (bytes[2] >> 2) & 0x0F,
            channel_configuration: (bytes[2] & 0b1) << 2 | bytes[3] >> 6,
            frame_length,
            buffer_fullness,
            raw_data_blocks: bytes[6] & 0b11,
        })
    }
}

/// Fallible header synthesis: rejects payloads that overflow the frame-length field.
pub fn try_synthesize(
    channels: u32,
    sample_rate: u32,
    payload_len: usize,
) -> Result<[u8; ADTS_HEADER_LEN], AdtsError> {
    AdtsFields::aac_lc(channels, sample_rate, payload_len).map(|f| f.to_bytes())
}

/// Total header synthesis for any input. A payload too large for the 13-bit
/// frame-length field saturates it at [`MAX_FRAME_LENGTH`].
pub fn synthesize(channels: u32, sample_rate: u32, payload_len: u32) -> [u8; ADTS_HEADER_LEN] {
    let payload_len = payload_len as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        log::warn!(
            "ADTS payload of {} bytes exceeds frame-length field, saturating",
            payload_len
        );
    }
    AdtsFields::aac_lc_saturating(channels, sample_rate, payload_len).to_bytes()
}
