#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use aac_capture_core::processing::timestamp::Timebase;
use aac_capture_core::{
    AacPacket, AudioFormat, BlockEncoder, CaptureError, DeliveryCallback, EncoderFactory, EncoderSettings, InputBackend,
    InputDelivery, PipelineDelegate, RenderError,
};

/// One scripted hardware delivery.
pub struct Delivery {
    pub bytes: Vec<u8>,
    pub frames: u32,
    pub ticks: u64,
    pub error: Option<RenderError>,
}

impl InputDelivery for Delivery {
    fn frame_count(&self) -> u32 {
        self.frames
    }

    fn host_ticks(&self) -> u64 {
        self.ticks
    }

    fn render(&mut self, dest: &mut [u8]) -> Result<(), RenderError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        dest.copy_from_slice(&self.bytes);
        Ok(())
    }
}

#[derive(Default)]
struct BackendShared {
    callback: Option<DeliveryCallback>,
    opens: u32,
    started: bool,
}

/// Input backend driven by the test thread, which stands in for the
/// realtime capture thread.
pub struct ScriptedBackend {
    shared: Arc<Mutex<BackendShared>>,
    fail_open: Option<i32>,
    timebase: Timebase,
}

/// Test-side handle to a [`ScriptedBackend`].
#[derive(Clone)]
pub struct BackendHandle {
    shared: Arc<Mutex<BackendShared>>,
    format: AudioFormat,
}

impl ScriptedBackend {
    pub fn new(format: AudioFormat) -> (Self, BackendHandle) {
        let shared = Arc::new(Mutex::new(BackendShared::default()));
        let backend = Self {
            shared: Arc::clone(&shared),
            fail_open: None,
            timebase: Timebase::nanoseconds(),
        };
        (backend, BackendHandle { shared, format })
    }

    pub fn failing_open(mut self, status: i32) -> Self {
        self.fail_open = Some(status);
        self
    }
}

impl InputBackend for ScriptedBackend {
    fn timebase(&self) -> Timebase {
        self.timebase
    }

    fn open(
        &mut self,
        _format: &AudioFormat,
        _io_buffer_frames: Option<u32>,
        callback: DeliveryCallback,
    ) -> Result<(), CaptureError> {
        let mut shared = self.shared.lock();
        shared.opens += 1;
        if let Some(status) = self.fail_open {
            return Err(CaptureError::device(status, "no input device"));
        }
        shared.callback = Some(callback);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.shared.lock().started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.shared.lock().started = false;
        Ok(())
    }

    fn close(&mut self) {
        let mut shared = self.shared.lock();
        shared.callback = None;
        shared.started = false;
    }

    fn is_open(&self) -> bool {
        self.shared.lock().callback.is_some()
    }
}

impl BackendHandle {
    pub fn opens(&self) -> u32 {
        self.shared.lock().opens
    }

    pub fn is_started(&self) -> bool {
        self.shared.lock().started
    }

    pub fn is_open(&self) -> bool {
        self.shared.lock().callback.is_some()
    }

    /// Run one delivery of `bytes` through the registered callback.
    pub fn deliver(&self, bytes: Vec<u8>, ticks: u64) {
        let frames = self.format.frames_in(bytes.len());
        self.run(Delivery {
            bytes,
            frames,
            ticks,
            error: None,
        });
    }

    pub fn deliver_error(&self, frames: u32, error: RenderError) {
        self.run(Delivery {
            bytes: Vec::new(),
            frames,
            ticks: 0,
            error: Some(error),
        });
    }

    fn run(&self, mut delivery: Delivery) {
        let callback = {
            let shared = self.shared.lock();
            if !shared.started {
                return;
            }
            shared.callback.clone()
        };
        if let Some(callback) = callback {
            callback(&mut delivery);
        }
    }
}

/// Echoes each frame as its payload, optionally priming or failing on
/// chosen frames (1-based).
pub struct ScriptedEncoder {
    index: u32,
    priming_frames: u32,
    fail_on: Vec<u32>,
}

impl BlockEncoder for ScriptedEncoder {
    fn frames_per_packet(&self) -> u32 {
        1024
    }

    fn encode_frame(&mut self, pcm: &[u8]) -> Result<Vec<u8>, CaptureError> {
        self.index += 1;
        if self.fail_on.contains(&self.index) {
            return Err(CaptureError::Encode(format!("converter rejected frame {}", self.index)));
        }
        if self.index <= self.priming_frames {
            return Ok(Vec::new());
        }
        Ok(pcm.to_vec())
    }
}

pub fn encoder_factory(
    priming_frames: u32,
    fail_on: Vec<u32>,
) -> Arc<dyn EncoderFactory> {
    Arc::new(move |_settings: &EncoderSettings| -> Result<Box<dyn BlockEncoder>, CaptureError> {
        Ok(Box::new(ScriptedEncoder {
            index: 0,
            priming_frames,
            fail_on: fail_on.clone(),
        }))
    })
}

#[derive(Default)]
pub struct RecordingDelegate {
    pub packets: Mutex<Vec<AacPacket>>,
    pub errors: Mutex<Vec<CaptureError>>,
}

impl PipelineDelegate for RecordingDelegate {
    fn on_packet(&self, packet: AacPacket) {
        self.packets.lock().push(packet);
    }

    fn on_error(&self, error: CaptureError) {
        self.errors.lock().push(error);
    }
}

/// Deterministic byte stream for conservation checks.
pub fn pattern(start: usize, len: usize) -> Vec<u8> {
    (start..start + len).map(|i| (i % 251) as u8).collect()
}
