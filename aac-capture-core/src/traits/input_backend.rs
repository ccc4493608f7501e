use std::sync::Arc;

use crate::models::audio_format::AudioFormat;
use crate::models::error::CaptureError;
use crate::processing::timestamp::Timebase;

/// Failure to pull samples out of the hardware for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderError {
    /// Native status code.
    pub status: i32,
    /// Whether the input path is unusable from now on.
    pub terminal: bool,
}

impl RenderError {
    pub fn transient(status: i32) -> Self {
        Self {
            status,
            terminal: false,
        }
    }

    pub fn terminal(status: i32) -> Self {
        Self {
            status,
            terminal: true,
        }
    }
}

/// One hardware delivery, valid only for the duration of the callback.
pub trait InputDelivery {
    /// Sample periods available in this delivery. Varies from call to call.
    fn frame_count(&self) -> u32;

    /// Host clock reading for the first sample, in [`InputBackend::timebase`] ticks.
    fn host_ticks(&self) -> u64;

    /// Copy the delivered samples into `dest` as interleaved PCM in the
    /// negotiated format. `dest` is exactly `frame_count × bytes_per_frame` long.
    fn render(&mut self, dest: &mut [u8]) -> Result<(), RenderError>;
}

/// Callback registered with the backend. Runs on the realtime capture thread;
/// must not block.
pub type DeliveryCallback = Arc<dyn Fn(&mut dyn InputDelivery) + Send + Sync + 'static>;

/// Hardware I/O backend owning one input stream.
///
/// Implemented by:
/// - `CpalInput` (aac-capture-native, `cpal` feature)
/// - scripted fakes in tests
pub trait InputBackend: Send {
    /// Tick length of [`InputDelivery::host_ticks`].
    fn timebase(&self) -> Timebase;

    /// Discover the device, negotiate `format` and register `callback`.
    /// `io_buffer_frames` is a preferred delivery size; backends may ignore it.
    fn open(
        &mut self,
        format: &AudioFormat,
        io_buffer_frames: Option<u32>,
        callback: DeliveryCallback,
    ) -> Result<(), CaptureError>;

    /// Begin hardware delivery on an opened stream.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Halt hardware delivery. No callback may be in flight once this returns.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Release the device. Must be safe to call in any state.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}
