use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_format::AudioFormat;
use crate::models::error::CaptureError;
use crate::models::media::PcmChunk;
use crate::models::state::LifecycleState;
use crate::processing::timestamp::Timebase;
use crate::session::dispatcher::{DispatchHandle, ErrorReporter};
use crate::traits::input_backend::{DeliveryCallback, InputBackend, InputDelivery};
use crate::traits::pipeline_delegate::{ChunkCallback, ErrorCallback};

/// Counters maintained by the capture callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    pub deliveries: u64,
    pub chunks_emitted: u64,
    pub bytes_captured: u64,
    pub render_failures: u64,
}

/// Lock-free counters bumped on the realtime thread.
#[derive(Debug, Default)]
struct DiagnosticCounters {
    deliveries: AtomicU64,
    chunks_emitted: AtomicU64,
    bytes_captured: AtomicU64,
    render_failures: AtomicU64,
}

impl DiagnosticCounters {
    fn snapshot(&self) -> CaptureDiagnostics {
        CaptureDiagnostics {
            deliveries: self.deliveries.load(Ordering::Relaxed),
            chunks_emitted: self.chunks_emitted.load(Ordering::Relaxed),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
        }
    }
}

/// Owns a hardware input backend and turns each delivery into a stamped
/// [`PcmChunk`].
///
/// ```text
/// [InputBackend] ──delivery──▶ render ▶ stamp (Timebase) ▶ PcmChunk ▶ chunk callback
///                                 │
///                                 └─ failure ─▶ ErrorReporter (dispatcher thread)
/// ```
///
/// The chunk callback runs synchronously on the realtime thread, exactly once
/// per successful delivery. `start`/`stop` take `&self` and may be called from
/// any thread.
pub struct CaptureDriver<B: InputBackend> {
    backend: Mutex<B>,
    format: AudioFormat,
    io_buffer_frames: Option<u32>,
    state: Arc<Mutex<LifecycleState>>,
    running: Arc<AtomicBool>,
    diagnostics: Arc<DiagnosticCounters>,
    chunk_callback: Option<ChunkCallback>,
    reporter: ErrorReporter,
}

impl<B: InputBackend> CaptureDriver<B> {
    pub fn new(backend: B, format: AudioFormat, dispatch: DispatchHandle) -> Self {
        Self {
            backend: Mutex::new(backend),
            format,
            io_buffer_frames: None,
            state: Arc::new(Mutex::new(LifecycleState::Idle)),
            running: Arc::new(AtomicBool::new(false)),
            diagnostics: Arc::new(DiagnosticCounters::default()),
            chunk_callback: None,
            reporter: ErrorReporter::new(None, dispatch),
        }
    }

    pub fn with_io_buffer_frames(mut self, frames: Option<u32>) -> Self {
        self.io_buffer_frames = frames;
        self
    }

    /// Register the chunk consumer. Takes effect on the next `start` that
    /// opens the backend.
    pub fn set_chunk_callback(&mut self, callback: ChunkCallback) {
        self.chunk_callback = Some(callback);
    }

    pub fn set_error_callback(&mut self, callback: ErrorCallback) {
        self.reporter = ErrorReporter::new(Some(callback), self.reporter.dispatch().clone());
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn state(&self) -> LifecycleState {
        self.state.lock().clone()
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.diagnostics.snapshot()
    }

    /// Idle → Running. Opens the backend on first use.
    ///
    /// Any setup failure moves the driver into the sticky error state, releases
    /// the backend and is returned as well as reported. Once in `Error`, calls
    /// are no-ops.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        match &*state {
            LifecycleState::Running => return Ok(()),
            LifecycleState::Error(e) => {
                log::debug!("capture start ignored, driver failed: {}", e);
                return Ok(());
            }
            LifecycleState::Idle => {}
        }

        let mut backend = self.backend.lock();
        if !backend.is_open() {
            let callback = self.delivery_callback(backend.timebase());
            if let Err(e) = backend.open(&self.format, self.io_buffer_frames, callback) {
                backend.close();
                return Err(self.fail(&mut state, e));
            }
            log::info!(
                "capture opened: {} Hz, {} bit, {} ch",
                self.format.sample_rate,
                self.format.bit_depth,
                self.format.channels
            );
        }

        // Deliveries that race the backend start are accepted.
        self.running.store(true, Ordering::Release);
        if let Err(e) = backend.start() {
            self.running.store(false, Ordering::Release);
            backend.close();
            return Err(self.fail(&mut state, e));
        }

        state.begin();
        Ok(())
    }

    /// Running → Idle. Idempotent.
    ///
    /// In `Error` the state is kept, but a backend left open by a terminal
    /// render failure is halted and released.
    ///
    /// The state lock is not held while the backend drains its in-flight
    /// callback, which may itself need the state on a terminal render failure.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let was_running = {
            let state = self.state.lock();
            if state.is_idle() {
                return Ok(());
            }
            state.is_running()
        };

        self.running.store(false, Ordering::Release);
        if !was_running {
            self.release_backend();
            return Ok(());
        }
        let result = {
            let mut backend = self.backend.lock();
            let result = backend.stop();
            if result.is_err() {
                backend.close();
            }
            result
        };

        let mut state = self.state.lock();
        if let Err(e) = result {
            return Err(self.fail(&mut state, e));
        }
        if state.end() {
            log::info!("capture stopped");
        }
        Ok(())
    }

    fn release_backend(&self) {
        let mut backend = self.backend.lock();
        if !backend.is_open() {
            return;
        }
        if let Err(e) = backend.stop() {
            log::warn!("failed to halt input after error: {}", e);
        }
        backend.close();
        log::info!("capture released after failure");
    }

    fn fail(&self, state: &mut LifecycleState, error: CaptureError) -> CaptureError {
        if state.fail(error.clone()) {
            self.reporter.report(error.clone());
        }
        error
    }

    fn delivery_callback(&self, timebase: Timebase) -> DeliveryCallback {
        let format = self.format;
        let running = Arc::clone(&self.running);
        let state = Arc::clone(&self.state);
        let diagnostics = Arc::clone(&self.diagnostics);
        let chunk_callback = self.chunk_callback.clone();
        let reporter = self.reporter.clone();

        Arc::new(move |delivery: &mut dyn InputDelivery| {
            if !running.load(Ordering::Acquire) {
                return;
            }

            let frame_count = delivery.frame_count();
            let len = format.bytes_for_frames(frame_count);
            let mut bytes = Vec::new();
            if let Err(e) = bytes.try_reserve_exact(len) {
                reporter.report(CaptureError::Allocation(format!(
                    "{} byte capture buffer: {}",
                    len, e
                )));
                return;
            }
            bytes.resize(len, 0);

            if let Err(render) = delivery.render(&mut bytes) {
                diagnostics.render_failures.fetch_add(1, Ordering::Relaxed);
                let error = CaptureError::device(render.status, "failed to render input samples");
                if render.terminal {
                    running.store(false, Ordering::Release);
                    if !state.lock().fail(error.clone()) {
                        return;
                    }
                }
                reporter.report(error);
                return;
            }

            let chunk = PcmChunk {
                bytes,
                frame_count,
                presentation_timestamp: timebase.ticks_to_nanos(delivery.host_ticks()),
                source_format: format,
            };

            diagnostics.deliveries.fetch_add(1, Ordering::Relaxed);
            diagnostics
                .bytes_captured
                .fetch_add(chunk.len() as u64, Ordering::Relaxed);
            if chunk_callback.is_some() {
                diagnostics.chunks_emitted.fetch_add(1, Ordering::Relaxed);
            }

            if let Some(ref callback) = chunk_callback {
                callback(chunk);
            }
        })
    }
}

impl<B: InputBackend> Drop for CaptureDriver<B> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        let backend = self.backend.get_mut();
        if backend.is_open() {
            if !self.state.lock().is_idle() {
                let _ = backend.stop();
            }
            backend.close();
        }
    }
}
