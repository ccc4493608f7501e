use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::config::SessionConfiguration;
use crate::models::error::CaptureError;
use crate::models::media::{AacPacket, PcmChunk};
use crate::models::state::LifecycleState;
use crate::session::capture_driver::{CaptureDiagnostics, CaptureDriver};
use crate::session::dispatcher::CallbackDispatcher;
use crate::session::encoder_driver::{EncodeDiagnostics, EncoderDriver, EncoderOptions};
use crate::traits::block_encoder::EncoderFactory;
use crate::traits::input_backend::InputBackend;
use crate::traits::pipeline_delegate::{ErrorCallback, PipelineDelegate};

/// Combined capture and encode counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineDiagnostics {
    pub chunks_captured: u64,
    pub bytes_captured: u64,
    pub render_failures: u64,
    pub chunks_dropped: u64,
    pub frames_encoded: u64,
    pub frames_failed: u64,
    pub packets_emitted: u64,
}

impl PipelineDiagnostics {
    fn combine(capture: CaptureDiagnostics, encode: EncodeDiagnostics) -> Self {
        Self {
            chunks_captured: capture.chunks_emitted,
            bytes_captured: capture.bytes_captured,
            render_failures: capture.render_failures,
            chunks_dropped: encode.chunks_dropped,
            frames_encoded: encode.frames_encoded,
            frames_failed: encode.frames_failed,
            packets_emitted: encode.packets_emitted,
        }
    }
}

type DelegateSlot = Arc<RwLock<Option<Arc<dyn PipelineDelegate>>>>;

/// Live capture to ADTS packets.
///
/// ```text
/// [InputBackend] → CaptureDriver ─PcmChunk─▶ EncoderDriver ─AacPacket─▶ PipelineDelegate::on_packet
///                        └──────── errors (aac-callbacks) ──────────────▶ PipelineDelegate::on_error
/// ```
///
/// Starting brings the encoder up before capture so no chunk is missed;
/// stopping halts capture first, then drains the encoder.
pub struct CapturePipeline<B: InputBackend> {
    capture: CaptureDriver<B>,
    encoder: Arc<EncoderDriver>,
    delegate: DelegateSlot,
    config: SessionConfiguration,
    // Declared last so queued callbacks run before the thread is joined.
    dispatcher: CallbackDispatcher,
}

impl<B: InputBackend> CapturePipeline<B> {
    pub fn new(
        backend: B,
        factory: Arc<dyn EncoderFactory>,
        config: SessionConfiguration,
    ) -> Result<Self, CaptureError> {
        let dispatcher = CallbackDispatcher::spawn()?;
        let delegate: DelegateSlot = Arc::new(RwLock::new(None));

        let mut encoder = EncoderDriver::new(factory, EncoderOptions::from(&config), dispatcher.handle());
        let slot = Arc::clone(&delegate);
        encoder.set_packet_callback(Arc::new(move |packet: AacPacket| {
            if let Some(delegate) = slot.read().as_ref() {
                delegate.on_packet(packet);
            }
        }));
        encoder.set_error_callback(error_forwarder(&delegate));
        let encoder = Arc::new(encoder);

        let mut capture = CaptureDriver::new(backend, config.audio_format(), dispatcher.handle())
            .with_io_buffer_frames(config.io_buffer_frames);
        let sink = Arc::clone(&encoder);
        capture.set_chunk_callback(Arc::new(move |chunk: PcmChunk| {
            sink.submit(chunk);
        }));
        capture.set_error_callback(error_forwarder(&delegate));

        Ok(Self {
            capture,
            encoder,
            delegate,
            config,
            dispatcher,
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn PipelineDelegate>) {
        *self.delegate.write() = Some(delegate);
    }

    pub fn config(&self) -> &SessionConfiguration {
        &self.config
    }

    /// The first failed stage's error, otherwise the capture state.
    pub fn state(&self) -> LifecycleState {
        let capture = self.capture.state();
        if capture.is_error() {
            return capture;
        }
        let encoder = self.encoder.state();
        if encoder.is_error() {
            return encoder;
        }
        capture
    }

    pub fn diagnostics(&self) -> PipelineDiagnostics {
        PipelineDiagnostics::combine(self.capture.diagnostics(), self.encoder.diagnostics())
    }

    /// Idle → Running. A no-op once either stage has failed.
    pub fn start(&self) -> Result<(), CaptureError> {
        if self.state().is_error() {
            return Ok(());
        }
        self.encoder.start()?;
        if let Err(e) = self.capture.start() {
            let _ = self.encoder.stop();
            return Err(e);
        }
        log::info!("pipeline started");
        Ok(())
    }

    /// Stop capture, then encode everything already captured.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let captured = self.capture.stop();
        let encoded = self.encoder.stop();
        log::info!("pipeline stopped");
        captured.and(encoded)
    }

    /// Block until every callback queued on the dispatcher so far has run.
    pub fn flush_callbacks(&self) {
        self.dispatcher.handle().flush();
    }
}

impl<B: InputBackend> Drop for CapturePipeline<B> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn error_forwarder(slot: &DelegateSlot) -> ErrorCallback {
    let slot = Arc::clone(slot);
    Arc::new(move |error: CaptureError| {
        if let Some(delegate) = slot.read().as_ref() {
            delegate.on_error(error);
        }
    })
}
