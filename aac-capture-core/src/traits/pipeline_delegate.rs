use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::media::{AacPacket, PcmChunk};

/// Receives each captured chunk; ownership moves to the consumer.
pub type ChunkCallback = Arc<dyn Fn(PcmChunk) + Send + Sync + 'static>;

/// Receives each encoded packet.
pub type PacketCallback = Arc<dyn Fn(AacPacket) + Send + Sync + 'static>;

/// Receives each distinct failure, never on the realtime capture thread.
pub type ErrorCallback = Arc<dyn Fn(CaptureError) + Send + Sync + 'static>;

/// Event delegate for a [`CapturePipeline`](crate::session::pipeline::CapturePipeline).
///
/// `on_packet` runs on the context chosen by
/// [`PacketDelivery`](crate::models::config::PacketDelivery); `on_error` runs on
/// the callback dispatcher thread. Implementations should hand off to their own
/// context if they need one.
pub trait PipelineDelegate: Send + Sync {
    fn on_packet(&self, packet: AacPacket);

    fn on_error(&self, error: CaptureError);
}
