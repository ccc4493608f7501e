use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::adts_writer::StreamSummary;
use crate::models::audio_format::AudioFormat;
use crate::models::error::CaptureError;

/// Metadata stored alongside an ADTS recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub file_path: String,
    pub format: AudioFormat,
    pub bitrate: u32,
    pub packet_count: u64,
    pub bytes_written: u64,
    pub duration_secs: f64,
    pub checksum: String,
}

impl StreamMetadata {
    pub fn new(file_path: &Path, format: AudioFormat, bitrate: u32, summary: &StreamSummary) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            file_path: file_path.display().to_string(),
            format,
            bitrate,
            packet_count: summary.packet_count,
            bytes_written: summary.bytes_written,
            duration_secs: summary.duration_secs,
            checksum: summary.checksum.clone(),
        }
    }
}

/// Sidecar path for a recording: `take.aac` → `take.metadata.json`.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write stream metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &StreamMetadata, recording_path: &Path) -> Result<(), CaptureError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::Storage(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json)
        .map_err(|e| CaptureError::Storage(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read stream metadata from a JSON sidecar file.
pub fn read_metadata(recording_path: &Path) -> Result<StreamMetadata, CaptureError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .map_err(|e| CaptureError::Storage(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| CaptureError::Storage(format!("failed to parse metadata: {}", e)))
}
