use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::models::media::AacPacket;

/// Totals for a finished ADTS stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSummary {
    pub packet_count: u64,
    pub bytes_written: u64,
    pub duration_secs: f64,
    /// Lowercase hex SHA-256 of every byte written.
    pub checksum: String,
}

/// Appends ADTS packets to any byte sink.
///
/// ## Stream Format
///
/// ```text
/// [7-byte ADTS header | raw AAC payload]
/// [7-byte ADTS header | raw AAC payload]
/// ...
/// ```
///
/// The result is a self-synchronising `.aac` elementary stream; no container
/// or trailer is written.
pub struct AdtsStreamWriter<W: Write> {
    inner: W,
    hasher: Sha256,
    packet_count: u64,
    bytes_written: u64,
    duration_secs: f64,
}

impl<W: Write> AdtsStreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            packet_count: 0,
            bytes_written: 0,
            duration_secs: 0.0,
        }
    }

    pub fn write_packet(&mut self, packet: &AacPacket) -> Result<(), CaptureError> {
        self.write_raw(&packet.adts_header)?;
        self.write_raw(&packet.payload)?;
        self.packet_count += 1;
        self.duration_secs += packet.timing.duration.as_secs_f64();
        Ok(())
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Flush the sink and return the stream totals with the final checksum.
    pub fn finish(mut self) -> Result<(W, StreamSummary), CaptureError> {
        self.inner
            .flush()
            .map_err(|e| CaptureError::Storage(format!("failed to flush stream: {}", e)))?;

        let summary = StreamSummary {
            packet_count: self.packet_count,
            bytes_written: self.bytes_written,
            duration_secs: self.duration_secs,
            checksum: hex_digest(self.hasher.finalize().as_slice()),
        };
        Ok((self.inner, summary))
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        self.inner
            .write_all(data)
            .map_err(|e| CaptureError::Storage(format!("write failed: {}", e)))?;
        self.hasher.update(data);
        self.bytes_written += data.len() as u64;
        Ok(())
    }
}

/// [`AdtsStreamWriter`] over a buffered file.
pub struct AdtsFileWriter {
    file_path: PathBuf,
    writer: AdtsStreamWriter<BufWriter<File>>,
}

impl AdtsFileWriter {
    /// Create (or truncate) `file_path`, creating parent directories as needed.
    pub fn create(file_path: impl Into<PathBuf>) -> Result<Self, CaptureError> {
        let file_path = file_path.into();
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::Storage(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&file_path)
            .map_err(|e| CaptureError::Storage(format!("failed to create file: {}", e)))?;
        log::debug!("writing ADTS stream to {}", file_path.display());

        Ok(Self {
            file_path,
            writer: AdtsStreamWriter::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn write_packet(&mut self, packet: &AacPacket) -> Result<(), CaptureError> {
        self.writer.write_packet(packet)
    }

    pub fn packet_count(&self) -> u64 {
        self.writer.packet_count()
    }

    /// Flush to disk and return the stream totals.
    pub fn finish(self) -> Result<StreamSummary, CaptureError> {
        let (buffered, summary) = self.writer.finish()?;
        let file = buffered
            .into_inner()
            .map_err(|e| CaptureError::Storage(format!("failed to flush file: {}", e.error())))?;
        file.sync_all()
            .map_err(|e| CaptureError::Storage(format!("failed to sync file: {}", e)))?;

        log::info!(
            "wrote {} packets ({} bytes, {:.2}s) to {}",
            summary.packet_count,
            summary.bytes_written,
            summary.duration_secs,
            self.file_path.display()
        );
        Ok(summary)
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
