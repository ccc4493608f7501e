use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::models::audio_format::AudioFormat;
use crate::models::config::{FrameFailurePolicy, PacketDelivery, SessionConfiguration};
use crate::models::error::CaptureError;
use crate::models::media::{AacPacket, PacketTiming, PcmChunk};
use crate::models::state::LifecycleState;
use crate::processing::adts;
use crate::processing::frame_accumulator::FrameAccumulator;
use crate::processing::timestamp::packet_duration;
use crate::session::dispatcher::{DispatchHandle, ErrorReporter};
use crate::traits::block_encoder::{BlockEncoder, EncoderFactory, EncoderSettings};
use crate::traits::pipeline_delegate::{ErrorCallback, PacketCallback};

/// Counters maintained by the encode worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeDiagnostics {
    pub chunks_received: u64,
    pub chunks_dropped: u64,
    pub frames_encoded: u64,
    pub frames_failed: u64,
    pub packets_emitted: u64,
}

/// Encoder-driver settings taken from a [`SessionConfiguration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    pub bitrate: u32,
    pub frames_per_packet: u32,
    pub queue_capacity: usize,
    pub frame_failure_policy: FrameFailurePolicy,
    pub packet_delivery: PacketDelivery,
}

impl From<&SessionConfiguration> for EncoderOptions {
    fn from(config: &SessionConfiguration) -> Self {
        Self {
            bitrate: config.bitrate,
            frames_per_packet: config.frames_per_packet,
            queue_capacity: config.queue_capacity,
            frame_failure_policy: config.frame_failure_policy,
            packet_delivery: config.packet_delivery,
        }
    }
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self::from(&SessionConfiguration::default())
    }
}

enum WorkerMessage {
    Chunk(PcmChunk),
    Drain,
}

struct Worker {
    sender: Sender<WorkerMessage>,
    handle: thread::JoinHandle<()>,
}

/// Reshapes captured PCM into encoder frames and emits ADTS-framed packets.
///
/// ```text
/// submit(PcmChunk) ─▶ [bounded queue] ─▶ aac-encode worker
///                                          └─ EncodeSession: FrameAccumulator ▶ BlockEncoder ▶ ADTS ▶ packet callback
/// ```
///
/// Chunks are processed strictly in submission order by a single worker, so the
/// leftover buffer and encoder instance are never touched concurrently.
/// `submit` never blocks: when the queue is full the chunk is dropped and an
/// allocation error is reported.
///
/// `stop` drains: chunks queued before the call are still encoded, then the
/// encoder is disposed and the leftover bytes discarded.
pub struct EncoderDriver {
    factory: Arc<dyn EncoderFactory>,
    options: EncoderOptions,
    state: Arc<Mutex<LifecycleState>>,
    worker: Mutex<Option<Worker>>,
    diagnostics: Arc<Mutex<EncodeDiagnostics>>,
    packet_callback: Option<PacketCallback>,
    reporter: ErrorReporter,
}

impl EncoderDriver {
    pub fn new(factory: Arc<dyn EncoderFactory>, options: EncoderOptions, dispatch: DispatchHandle) -> Self {
        Self {
            factory,
            options,
            state: Arc::new(Mutex::new(LifecycleState::Idle)),
            worker: Mutex::new(None),
            diagnostics: Arc::new(Mutex::new(EncodeDiagnostics::default())),
            packet_callback: None,
            reporter: ErrorReporter::new(None, dispatch),
        }
    }

    /// Register the packet consumer. Takes effect on the next `start`.
    pub fn set_packet_callback(&mut self, callback: PacketCallback) {
        self.packet_callback = Some(callback);
    }

    pub fn set_error_callback(&mut self, callback: ErrorCallback) {
        self.reporter = ErrorReporter::new(Some(callback), self.reporter.dispatch().clone());
    }

    pub fn state(&self) -> LifecycleState {
        self.state.lock().clone()
    }

    pub fn diagnostics(&self) -> EncodeDiagnostics {
        *self.diagnostics.lock()
    }

    /// Idle → Running: spawn the encode worker. The converter itself is
    /// created lazily from the first chunk's format.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if !state.is_idle() {
            return Ok(());
        }

        let (sender, receiver) = crossbeam_channel::bounded(self.options.queue_capacity.max(1));
        let session = EncodeSession::new(
            Arc::clone(&self.factory),
            self.options,
            PacketSink {
                callback: self.packet_callback.clone(),
                delivery: self.options.packet_delivery,
                dispatch: self.reporter.dispatch().clone(),
            },
        );
        let context = WorkerContext {
            state: Arc::clone(&self.state),
            diagnostics: Arc::clone(&self.diagnostics),
            reporter: self.reporter.clone(),
        };

        let handle = thread::Builder::new()
            .name("aac-encode".into())
            .spawn(move || run_worker(receiver, session, context))
            .map_err(|e| CaptureError::Allocation(format!("failed to spawn encode thread: {}", e)))?;

        *self.worker.lock() = Some(Worker { sender, handle });
        state.begin();
        log::debug!("encoder started");
        Ok(())
    }

    /// Queue a chunk for encoding. Returns `false` if the chunk was not
    /// accepted (driver not running, or queue full).
    pub fn submit(&self, chunk: PcmChunk) -> bool {
        let worker = self.worker.lock();
        let Some(worker) = worker.as_ref() else {
            return false;
        };

        match worker.sender.try_send(WorkerMessage::Chunk(chunk)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.diagnostics.lock().chunks_dropped += 1;
                self.reporter.report(CaptureError::Allocation(
                    "encode queue full, chunk dropped".into(),
                ));
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Running → Idle after draining queued chunks. Idempotent; a no-op once
    /// in `Error` (the worker has already wound down).
    pub fn stop(&self) -> Result<(), CaptureError> {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.sender.send(WorkerMessage::Drain);
            if worker.handle.join().is_err() {
                log::error!("encode worker panicked");
            }
        }

        if self.state.lock().end() {
            log::debug!("encoder stopped");
        }
        Ok(())
    }
}

impl Drop for EncoderDriver {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

struct WorkerContext {
    state: Arc<Mutex<LifecycleState>>,
    diagnostics: Arc<Mutex<EncodeDiagnostics>>,
    reporter: ErrorReporter,
}

fn run_worker(receiver: Receiver<WorkerMessage>, mut session: EncodeSession, context: WorkerContext) {
    for message in receiver.iter() {
        let chunk = match message {
            WorkerMessage::Chunk(chunk) => chunk,
            WorkerMessage::Drain => break,
        };
        if context.state.lock().is_error() {
            break;
        }

        context.diagnostics.lock().chunks_received += 1;
        let outcome = session.process(chunk);

        {
            let mut d = context.diagnostics.lock();
            d.frames_encoded += outcome.frames_encoded;
            d.frames_failed += outcome.frames_failed;
            d.packets_emitted += outcome.packets_emitted;
        }

        for error in outcome.errors {
            context.reporter.report(error);
        }
        if let Some(fatal) = outcome.fatal {
            if context.state.lock().fail(fatal.clone()) {
                context.reporter.report(fatal);
            }
            break;
        }
    }
    log::debug!(
        "encode worker exiting, discarding {} leftover bytes",
        session.leftover_len()
    );
}

/// Where finished packets go.
struct PacketSink {
    callback: Option<PacketCallback>,
    delivery: PacketDelivery,
    dispatch: DispatchHandle,
}

impl PacketSink {
    fn deliver(&self, packet: AacPacket) {
        let Some(ref callback) = self.callback else {
            return;
        };
        match self.delivery {
            PacketDelivery::EncodeWorker => callback(packet),
            PacketDelivery::Dispatcher => {
                let callback = Arc::clone(callback);
                self.dispatch.post(move || callback(packet));
            }
        }
    }
}

/// Result of processing one chunk.
#[derive(Debug, Default)]
struct ChunkOutcome {
    frames_encoded: u64,
    frames_failed: u64,
    packets_emitted: u64,
    /// Recovered failures, reported once each.
    errors: Vec<CaptureError>,
    /// Failure that ends the session.
    fatal: Option<CaptureError>,
}

/// Converter set up on the first chunk.
struct ActiveEncoder {
    encoder: Box<dyn BlockEncoder>,
    accumulator: FrameAccumulator,
    format: AudioFormat,
    frames_per_packet: u32,
}

/// Per-session state owned by the encode worker: converter handle and
/// leftover buffer. Dropped (and so released) when the worker exits.
struct EncodeSession {
    factory: Arc<dyn EncoderFactory>,
    options: EncoderOptions,
    sink: PacketSink,
    active: Option<ActiveEncoder>,
}

impl EncodeSession {
    fn new(factory: Arc<dyn EncoderFactory>, options: EncoderOptions, sink: PacketSink) -> Self {
        Self {
            factory,
            options,
            sink,
            active: None,
        }
    }

    fn leftover_len(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.accumulator.leftover_len())
    }

    fn process(&mut self, chunk: PcmChunk) -> ChunkOutcome {
        let mut outcome = ChunkOutcome::default();
        if chunk.is_empty() {
            return outcome;
        }
        let policy = self.options.frame_failure_policy;

        let Self {
            factory,
            options,
            sink,
            active,
        } = self;
        let active = match ensure_active(active, &**factory, options, chunk.source_format) {
            Ok(active) => active,
            Err(e) => {
                outcome.fatal = Some(e);
                return outcome;
            }
        };

        if chunk.source_format != active.format {
            outcome.errors.push(CaptureError::Encode(format!(
                "chunk format {:?} differs from session format {:?}, chunk dropped",
                chunk.source_format, active.format
            )));
            return outcome;
        }

        let timing = PacketTiming {
            duration: packet_duration(active.frames_per_packet, active.format.sample_rate),
            presentation_timestamp: chunk.presentation_timestamp,
        };
        let channels = active.format.channels as u32;
        let sample_rate = active.format.sample_rate;
        let ActiveEncoder {
            encoder, accumulator, ..
        } = active;

        let pushed = accumulator.push(&chunk.bytes, |frame| {
            if outcome.fatal.is_some() {
                return;
            }
            match encode_one(encoder.as_mut(), frame, channels, sample_rate, timing) {
                Ok(Some(packet)) => {
                    outcome.frames_encoded += 1;
                    outcome.packets_emitted += 1;
                    sink.deliver(packet);
                }
                Ok(None) => outcome.frames_encoded += 1,
                Err(e) => {
                    outcome.frames_failed += 1;
                    match policy {
                        FrameFailurePolicy::ContinueOnError => outcome.errors.push(e),
                        FrameFailurePolicy::AbortSession => outcome.fatal = Some(e),
                    }
                }
            }
        });

        if let Err(e) = pushed {
            outcome.errors.push(e);
        }
        outcome
    }
}

/// Create the converter on first use and size the accumulator from the
/// frame length it reports.
fn ensure_active<'a>(
    active: &'a mut Option<ActiveEncoder>,
    factory: &dyn EncoderFactory,
    options: &EncoderOptions,
    format: AudioFormat,
) -> Result<&'a mut ActiveEncoder, CaptureError> {
    if active.is_none() {
        *active = Some(create_active(factory, options, format)?);
    }
    active
        .as_mut()
        .ok_or_else(|| CaptureError::Encode("encoder not initialised".into()))
}

fn create_active(
    factory: &dyn EncoderFactory,
    options: &EncoderOptions,
    format: AudioFormat,
) -> Result<ActiveEncoder, CaptureError> {
    let encoder = factory.create(&EncoderSettings {
        input_format: format,
        bitrate: options.bitrate,
        frames_per_packet: options.frames_per_packet,
    })?;
    let frames_per_packet = encoder.frames_per_packet();
    let frame_len = NonZeroUsize::new(format.bytes_for_frames(frames_per_packet)).ok_or_else(|| {
        CaptureError::Encode(format!(
            "zero-length encode frame ({} frames × {} bytes)",
            frames_per_packet,
            format.bytes_per_frame()
        ))
    })?;

    log::info!(
        "encoder ready: {} Hz, {} ch, {} bps, {} byte frames",
        format.sample_rate,
        format.channels,
        options.bitrate,
        frame_len
    );
    Ok(ActiveEncoder {
        encoder,
        accumulator: FrameAccumulator::new(frame_len),
        format,
        frames_per_packet,
    })
}

/// Encode one frame and frame the result. `Ok(None)` while the encoder primes.
fn encode_one(
    encoder: &mut dyn BlockEncoder,
    frame: &[u8],
    channels: u32,
    sample_rate: u32,
    timing: PacketTiming,
) -> Result<Option<AacPacket>, CaptureError> {
    let payload = encoder.encode_frame(frame)?;
    if payload.is_empty() {
        log::trace!("encoder produced no output for frame");
        return Ok(None);
    }
    let adts_header = adts::try_synthesize(channels, sample_rate, payload.len())
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    Ok(Some(AacPacket {
        adts_header,
        payload,
        timing,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::adts::AdtsFields;
    use crate::session::dispatcher::CallbackDispatcher;

    /// Emits a payload naming the frame index and first input byte.
    struct CountingEncoder {
        index: u32,
        fail_on: Vec<u32>,
        payload_len: usize,
    }

    impl BlockEncoder for CountingEncoder {
        fn frames_per_packet(&self) -> u32 {
            1024
        }

        fn encode_frame(&mut self, pcm: &[u8]) -> Result<Vec<u8>, CaptureError> {
            self.index += 1;
            if self.fail_on.contains(&self.index) {
                return Err(CaptureError::Encode(format!("frame {} rejected", self.index)));
            }
            let mut payload = vec![0u8; self.payload_len];
            payload[0] = self.index as u8;
            payload[1] = pcm[0];
            Ok(payload)
        }
    }

    struct CountingFactory {
        fail_on: Vec<u32>,
        payload_len: usize,
    }

    impl EncoderFactory for CountingFactory {
        fn create(&self, _settings: &EncoderSettings) -> Result<Box<dyn BlockEncoder>, CaptureError> {
            Ok(Box::new(CountingEncoder {
                index: 0,
                fail_on: self.fail_on.clone(),
                payload_len: self.payload_len,
            }))
        }
    }

    fn session(fail_on: Vec<u32>, policy: FrameFailurePolicy) -> (EncodeSession, Arc<Mutex<Vec<AacPacket>>>) {
        let packets = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&packets);
        let dispatcher = CallbackDispatcher::spawn().unwrap();
        let options = EncoderOptions {
            frame_failure_policy: policy,
            ..Default::default()
        };
        let session = EncodeSession::new(
            Arc::new(CountingFactory { fail_on, payload_len: 100 }),
            options,
            PacketSink {
                callback: Some(Arc::new(move |p: AacPacket| sink.lock().push(p))),
                delivery: PacketDelivery::EncodeWorker,
                dispatch: dispatcher.handle(),
            },
        );
        (session, packets)
    }

    fn chunk(bytes: Vec<u8>, pts: i64) -> PcmChunk {
        let format = AudioFormat::new(44100, 16, 2);
        PcmChunk {
            frame_count: format.frames_in(bytes.len()),
            bytes,
            presentation_timestamp: pts,
            source_format: format,
        }
    }

    #[test]
    fn packets_carry_adts_header_and_chunk_timing() {
        let (mut session, packets) = session(vec![], FrameFailurePolicy::ContinueOnError);

        let outcome = session.process(chunk(vec![5u8; 4096 * 2 + 10], 42));

        assert_eq!(outcome.packets_emitted, 2);
        let packets = packets.lock();
        for packet in packets.iter() {
            let fields = AdtsFields::parse(&packet.adts_header).unwrap();
            assert_eq!(fields.frame_length, 107);
            assert_eq!(fields.sample_rate_index, 4);
            assert_eq!(fields.channel_configuration, 2);
            assert_eq!(packet.timing.presentation_timestamp, 42);
            assert_eq!(packet.timing.duration.value, 1024);
            assert_eq!(packet.timing.duration.timescale, 44100);
        }
        assert_eq!(session.leftover_len(), 10);
    }

    #[test]
    fn failed_frame_is_dropped_and_encoding_continues() {
        let (mut session, packets) = session(vec![3], FrameFailurePolicy::ContinueOnError);

        let outcome = session.process(chunk(vec![1u8; 4096 * 5], 0));

        assert_eq!(outcome.packets_emitted, 4);
        assert_eq!(outcome.frames_failed, 1);
        assert_eq!(outcome.errors, vec![CaptureError::Encode("frame 3 rejected".into())]);
        assert!(outcome.fatal.is_none());
        let indices: Vec<u8> = packets.lock().iter().map(|p| p.payload[0]).collect();
        assert_eq!(indices, vec![1, 2, 4, 5]);
    }

    #[test]
    fn abort_policy_stops_at_failed_frame() {
        let (mut session, packets) = session(vec![3], FrameFailurePolicy::AbortSession);

        let outcome = session.process(chunk(vec![1u8; 4096 * 5], 0));

        assert_eq!(packets.lock().len(), 2);
        assert_eq!(outcome.fatal, Some(CaptureError::Encode("frame 3 rejected".into())));
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn oversized_payload_is_an_encode_error() {
        let packets = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&packets);
        let dispatcher = CallbackDispatcher::spawn().unwrap();
        let mut session = EncodeSession::new(
            Arc::new(CountingFactory { fail_on: vec![], payload_len: adts::MAX_PAYLOAD_LEN + 1 }),
            EncoderOptions::default(),
            PacketSink {
                callback: Some(Arc::new(move |p: AacPacket| sink.lock().push(p))),
                delivery: PacketDelivery::EncodeWorker,
                dispatch: dispatcher.handle(),
            },
        );

        let outcome = session.process(chunk(vec![0u8; 4096], 0));

        assert!(packets.lock().is_empty());
        assert_eq!(outcome.frames_failed, 1);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn zero_length_frame_is_fatal() {
        let (mut session, _) = session(vec![], FrameFailurePolicy::ContinueOnError);
        let mut bad = chunk(vec![0u8; 8], 0);
        bad.source_format = AudioFormat::new(44100, 16, 0);

        let outcome = session.process(bad);

        assert!(matches!(outcome.fatal, Some(CaptureError::Encode(_))));
    }

    #[test]
    fn empty_chunk_does_not_set_up_encoder() {
        let (mut session, packets) = session(vec![], FrameFailurePolicy::ContinueOnError);

        let outcome = session.process(chunk(Vec::new(), 5));

        assert!(session.active.is_none());
        assert!(outcome.errors.is_empty() && outcome.fatal.is_none());
        assert!(packets.lock().is_empty());
    }

    #[test]
    fn format_change_mid_session_drops_chunk() {
        let (mut session, packets) = session(vec![], FrameFailurePolicy::ContinueOnError);
        session.process(chunk(vec![0u8; 100], 0));

        let mut other = chunk(vec![0u8; 8192], 0);
        other.source_format = AudioFormat::new(48000, 16, 2);
        let outcome = session.process(other);

        assert_eq!(outcome.errors.len(), 1);
        assert!(packets.lock().is_empty());
        assert_eq!(session.leftover_len(), 100);
    }

    fn driver(
        dispatcher: &CallbackDispatcher,
        fail_on: Vec<u32>,
        options: EncoderOptions,
    ) -> (EncoderDriver, Arc<Mutex<Vec<AacPacket>>>, Arc<Mutex<Vec<CaptureError>>>) {
        let packets = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let mut driver = EncoderDriver::new(
            Arc::new(CountingFactory { fail_on, payload_len: 64 }),
            options,
            dispatcher.handle(),
        );
        let sink = Arc::clone(&packets);
        driver.set_packet_callback(Arc::new(move |p: AacPacket| sink.lock().push(p)));
        let sink = Arc::clone(&errors);
        driver.set_error_callback(Arc::new(move |e: CaptureError| sink.lock().push(e)));
        (driver, packets, errors)
    }

    #[test]
    fn stop_drains_queued_chunks() {
        let dispatcher = CallbackDispatcher::spawn().unwrap();
        let (driver, packets, errors) = driver(&dispatcher, vec![], EncoderOptions::default());

        driver.start().unwrap();
        assert!(driver.state().is_running());
        for i in 0..8 {
            assert!(driver.submit(chunk(vec![i as u8; 2048], i * 1000)));
        }
        driver.stop().unwrap();
        dispatcher.handle().flush();

        assert!(driver.state().is_idle());
        let first_bytes: Vec<u8> = packets.lock().iter().map(|p| p.payload[1]).collect();
        assert_eq!(first_bytes, vec![0, 2, 4, 6]);
        assert!(errors.lock().is_empty());

        let diagnostics = driver.diagnostics();
        assert_eq!(diagnostics.chunks_received, 8);
        assert_eq!(diagnostics.packets_emitted, 4);
        assert!(!driver.submit(chunk(vec![0; 16], 0)));
    }

    #[test]
    fn abort_policy_leaves_driver_in_error() {
        let dispatcher = CallbackDispatcher::spawn().unwrap();
        let options = EncoderOptions {
            frame_failure_policy: FrameFailurePolicy::AbortSession,
            ..Default::default()
        };
        let (driver, packets, errors) = driver(&dispatcher, vec![2], options);

        driver.start().unwrap();
        driver.submit(chunk(vec![0u8; 4096 * 3], 0));
        driver.stop().unwrap();
        dispatcher.handle().flush();

        assert_eq!(packets.lock().len(), 1);
        assert_eq!(*errors.lock(), vec![CaptureError::Encode("frame 2 rejected".into())]);
        assert_eq!(driver.state().error(), Some(&CaptureError::Encode("frame 2 rejected".into())));

        // sticky: start is a no-op until the owner rebuilds the driver
        driver.start().unwrap();
        assert!(driver.state().is_error());
        assert!(!driver.submit(chunk(vec![0u8; 4096], 0)));
    }

    #[test]
    fn dispatcher_delivery_runs_off_the_worker() {
        let dispatcher = CallbackDispatcher::spawn().unwrap();
        let options = EncoderOptions {
            packet_delivery: PacketDelivery::Dispatcher,
            ..Default::default()
        };
        let threads = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&threads);
        let mut driver = EncoderDriver::new(
            Arc::new(CountingFactory { fail_on: vec![], payload_len: 64 }),
            options,
            dispatcher.handle(),
        );
        driver.set_packet_callback(Arc::new(move |_p: AacPacket| {
            seen.lock().push(thread::current().name().map(str::to_owned));
        }));

        driver.start().unwrap();
        driver.submit(chunk(vec![0u8; 4096 * 2], 0));
        driver.stop().unwrap();
        dispatcher.handle().flush();

        let threads = threads.lock();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|name| name.as_deref() == Some("aac-callbacks")));
    }

    /// Signals on entry to each frame, then blocks until the gate opens.
    struct GatedEncoder {
        entered: Sender<()>,
        gate: Receiver<()>,
    }

    impl BlockEncoder for GatedEncoder {
        fn frames_per_packet(&self) -> u32 {
            1024
        }

        fn encode_frame(&mut self, _pcm: &[u8]) -> Result<Vec<u8>, CaptureError> {
            let _ = self.entered.send(());
            let _ = self.gate.recv();
            Ok(vec![0u8; 16])
        }
    }

    #[test]
    fn full_queue_drops_and_reports() {
        let dispatcher = CallbackDispatcher::spawn().unwrap();
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded::<()>();
        let factory = move |_: &EncoderSettings| -> Result<Box<dyn BlockEncoder>, CaptureError> {
            Ok(Box::new(GatedEncoder {
                entered: entered_tx.clone(),
                gate: gate_rx.clone(),
            }))
        };
        let mut driver = EncoderDriver::new(
            Arc::new(factory),
            EncoderOptions {
                queue_capacity: 1,
                ..Default::default()
            },
            dispatcher.handle(),
        );
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        driver.set_error_callback(Arc::new(move |e: CaptureError| sink.lock().push(e)));

        assert!(!driver.submit(chunk(vec![0u8; 4096], 0)));
        driver.start().unwrap();
        assert!(driver.submit(chunk(vec![0u8; 4096], 0)));
        entered_rx.recv().unwrap();

        assert!(driver.submit(chunk(vec![0u8; 4096], 1)));
        assert!(!driver.submit(chunk(vec![0u8; 4096], 2)));

        drop(gate_tx);
        driver.stop().unwrap();
        dispatcher.handle().flush();

        let diagnostics = driver.diagnostics();
        assert_eq!(diagnostics.chunks_dropped, 1);
        assert_eq!(diagnostics.chunks_received, 2);
        assert_eq!(errors.lock().len(), 1);
        assert!(matches!(errors.lock()[0], CaptureError::Allocation(_)));
    }
}
