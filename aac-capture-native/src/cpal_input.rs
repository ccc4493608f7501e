//! cpal input backend.
//!
//! Opens a capture device through the platform's default cpal host and
//! delivers interleaved 16-bit PCM through the core `DeliveryCallback`.

use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig, StreamInstant};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use aac_capture_core::models::audio_format::AudioFormat;
use aac_capture_core::models::error::CaptureError;
use aac_capture_core::processing::timestamp::Timebase;
use aac_capture_core::traits::input_backend::{DeliveryCallback, InputBackend, InputDelivery, RenderError};

/// Status codes carried by [`CaptureError::Device`] for cpal failures.
pub mod status {
    pub const NO_DEVICE: i32 = -1;
    pub const UNSUPPORTED_FORMAT: i32 = -2;
    pub const BUILD_STREAM: i32 = -3;
    pub const PLAY: i32 = -4;
    pub const PAUSE: i32 = -5;
    pub const DEVICE_LOST: i32 = -6;
    pub const BACKEND: i32 = -7;
    pub const THREAD: i32 = -8;
    pub const BUFFER_SIZE: i32 = -9;
    pub const NOT_OPEN: i32 = -10;
}

enum Command {
    Play(Sender<Result<(), CaptureError>>),
    Pause(Sender<Result<(), CaptureError>>),
    Close,
}

struct StreamThread {
    commands: Sender<Command>,
    handle: thread::JoinHandle<()>,
}

/// cpal capture.
///
/// `cpal::Stream` is not `Send` on every host, so the stream lives on a
/// dedicated `cpal-input` thread for its whole life; `start`/`stop` are
/// forwarded to it and acknowledged.
///
/// Host ticks are nanoseconds of stream capture time since the first
/// delivery, so the timebase is the identity.
pub struct CpalInput {
    device_name: Option<String>,
    stream_thread: Mutex<Option<StreamThread>>,
}

impl CpalInput {
    /// Capture from the host's default input device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            stream_thread: Mutex::new(None),
        }
    }

    /// Capture from the input device whose name matches `name`.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            stream_thread: Mutex::new(None),
        }
    }

    /// Names of the host's input devices.
    pub fn input_device_names() -> Result<Vec<String>, CaptureError> {
        let devices = cpal::default_host()
            .input_devices()
            .map_err(|e| CaptureError::device(status::NO_DEVICE, format!("failed to enumerate devices: {}", e)))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    fn request(&self, make: fn(Sender<Result<(), CaptureError>>) -> Command) -> Result<(), CaptureError> {
        let guard = self.stream_thread.lock();
        let Some(stream_thread) = guard.as_ref() else {
            return Err(CaptureError::device(status::NOT_OPEN, "input stream is not open"));
        };

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        stream_thread
            .commands
            .send(make(reply_tx))
            .map_err(|_| CaptureError::device(status::THREAD, "input stream thread has exited"))?;
        reply_rx
            .recv()
            .map_err(|_| CaptureError::device(status::THREAD, "input stream thread has exited"))?
    }
}

impl InputBackend for CpalInput {
    fn timebase(&self) -> Timebase {
        Timebase::nanoseconds()
    }

    fn open(
        &mut self,
        format: &AudioFormat,
        io_buffer_frames: Option<u32>,
        callback: DeliveryCallback,
    ) -> Result<(), CaptureError> {
        if self.is_open() {
            return Ok(());
        }
        if format.bit_depth != 16 {
            return Err(CaptureError::device(
                status::UNSUPPORTED_FORMAT,
                format!("{}-bit capture is not supported", format.bit_depth),
            ));
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
        let device_name = self.device_name.clone();
        let format = *format;

        let handle = thread::Builder::new()
            .name("cpal-input".into())
            .spawn(move || run_stream(device_name, format, io_buffer_frames, callback, ready_tx, commands_rx))
            .map_err(|e| CaptureError::device(status::THREAD, format!("failed to spawn input thread: {}", e)))?;

        let opened = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::device(status::THREAD, "input thread exited during open")));
        if let Err(e) = opened {
            let _ = handle.join();
            return Err(e);
        }

        *self.stream_thread.lock() = Some(StreamThread {
            commands: commands_tx,
            handle,
        });
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.request(Command::Play)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.request(Command::Pause)
    }

    fn close(&mut self) {
        if let Some(stream_thread) = self.stream_thread.lock().take() {
            let _ = stream_thread.commands.send(Command::Close);
            if stream_thread.handle.join().is_err() {
                log::error!("cpal input thread panicked");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream_thread.lock().is_some()
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owns the stream until `Close` arrives or the backend is dropped.
fn run_stream(
    device_name: Option<String>,
    format: AudioFormat,
    io_buffer_frames: Option<u32>,
    callback: DeliveryCallback,
    ready: Sender<Result<(), CaptureError>>,
    commands: Receiver<Command>,
) {
    let stream = match open_stream(device_name.as_deref(), &format, io_buffer_frames, callback) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    for command in commands.iter() {
        match command {
            Command::Play(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| CaptureError::device(status::PLAY, format!("failed to start stream: {}", e)));
                let _ = reply.send(result);
            }
            Command::Pause(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| CaptureError::device(status::PAUSE, format!("failed to stop stream: {}", e)));
                let _ = reply.send(result);
            }
            Command::Close => break,
        }
    }
    drop(stream);
    log::debug!("cpal input stream closed");
}

fn open_stream(
    device_name: Option<&str>,
    format: &AudioFormat,
    io_buffer_frames: Option<u32>,
    callback: DeliveryCallback,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = match device_name {
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::device(status::NO_DEVICE, "no default input device"))?,
        Some(name) => host
            .input_devices()
            .map_err(|e| CaptureError::device(status::NO_DEVICE, format!("failed to enumerate devices: {}", e)))?
            .find(|d| d.name().ok().as_deref() == Some(name))
            .ok_or_else(|| CaptureError::device(status::NO_DEVICE, format!("input device not found: {}", name)))?,
    };

    let sample_format = negotiate_sample_format(&device, format)?;
    let config = StreamConfig {
        channels: format.channels as u16,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: match io_buffer_frames {
            Some(frames) => cpal::BufferSize::Fixed(frames),
            None => cpal::BufferSize::Default,
        },
    };

    log::info!(
        "opening {} at {} Hz, {} ch ({:?})",
        device.name().unwrap_or_else(|_| "input device".into()),
        format.sample_rate,
        format.channels,
        sample_format
    );

    match sample_format {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, callback),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, callback),
        SampleFormat::F32 => build_stream::<f32>(&device, &config, callback),
        other => Err(CaptureError::device(
            status::UNSUPPORTED_FORMAT,
            format!("unsupported sample format {:?}", other),
        )),
    }
}

/// Prefer a native 16-bit stream, then float.
fn negotiate_sample_format(device: &cpal::Device, format: &AudioFormat) -> Result<SampleFormat, CaptureError> {
    let configs = device
        .supported_input_configs()
        .map_err(|e| CaptureError::device(status::UNSUPPORTED_FORMAT, format!("no supported configs: {}", e)))?;

    let candidates: Vec<SampleFormat> = configs
        .filter(|c| {
            c.channels() == format.channels as u16
                && c.min_sample_rate().0 <= format.sample_rate
                && format.sample_rate <= c.max_sample_rate().0
        })
        .map(|c| c.sample_format())
        .collect();

    [SampleFormat::I16, SampleFormat::F32, SampleFormat::U16]
        .into_iter()
        .find(|preferred| candidates.contains(preferred))
        .ok_or_else(|| {
            CaptureError::device(
                status::UNSUPPORTED_FORMAT,
                format!(
                    "device cannot capture {} Hz, {} ch",
                    format.sample_rate, format.channels
                ),
            )
        })
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    callback: DeliveryCallback,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample + Send + 'static,
    i16: FromSample<T>,
{
    let channels = config.channels as usize;
    let on_data = {
        let callback = Arc::clone(&callback);
        let mut first_capture: Option<StreamInstant> = None;
        move |data: &[T], info: &cpal::InputCallbackInfo| {
            let capture = info.timestamp().capture;
            let origin = *first_capture.get_or_insert(capture);
            let ticks = capture
                .duration_since(&origin)
                .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));

            let mut delivery = CpalDelivery { data, channels, ticks };
            callback(&mut delivery);
        }
    };
    let on_error = move |err: cpal::StreamError| {
        log::warn!("input stream error: {}", err);
        let error = match err {
            cpal::StreamError::DeviceNotAvailable => RenderError::terminal(status::DEVICE_LOST),
            _ => RenderError::transient(status::BACKEND),
        };
        callback(&mut FailedDelivery { error });
    };

    device
        .build_input_stream(config, on_data, on_error, None)
        .map_err(|e| CaptureError::device(status::BUILD_STREAM, format!("failed to build stream: {}", e)))
}

/// One cpal buffer, converted to interleaved native-endian i16 on render.
struct CpalDelivery<'a, T> {
    data: &'a [T],
    channels: usize,
    ticks: u64,
}

impl<T> InputDelivery for CpalDelivery<'_, T>
where
    T: Sample,
    i16: FromSample<T>,
{
    fn frame_count(&self) -> u32 {
        (self.data.len() / self.channels.max(1)) as u32
    }

    fn host_ticks(&self) -> u64 {
        self.ticks
    }

    fn render(&mut self, dest: &mut [u8]) -> Result<(), RenderError> {
        let samples = self.frame_count() as usize * self.channels;
        if dest.len() != samples * 2 {
            return Err(RenderError::transient(status::BUFFER_SIZE));
        }
        for (out, &sample) in dest.chunks_exact_mut(2).zip(&self.data[..samples]) {
            let value: i16 = Sample::from_sample(sample);
            out.copy_from_slice(&value.to_ne_bytes());
        }
        Ok(())
    }
}

/// Stream-level failure surfaced to the capture driver as a render error.
struct FailedDelivery {
    error: RenderError,
}

impl InputDelivery for FailedDelivery {
    fn frame_count(&self) -> u32 {
        0
    }

    fn host_ticks(&self) -> u64 {
        0
    }

    fn render(&mut self, _dest: &mut [u8]) -> Result<(), RenderError> {
        Err(self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_samples_render_as_native_i16() {
        let data = [0.0f32, 1.0, -1.0, 0.5];
        let mut delivery = CpalDelivery {
            data: &data,
            channels: 2,
            ticks: 7,
        };
        assert_eq!(delivery.frame_count(), 2);

        let mut dest = [0u8; 8];
        delivery.render(&mut dest).unwrap();

        let rendered: Vec<i16> = dest
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(rendered[0], 0);
        assert!(rendered[1] >= i16::MAX - 1);
        assert!(rendered[2] <= -i16::MAX);
        assert!((rendered[3] - 16384).abs() <= 1);
    }

    #[test]
    fn i16_samples_copy_through() {
        let data = [1i16, -2, 300];
        let mut delivery = CpalDelivery {
            data: &data,
            channels: 1,
            ticks: 0,
        };
        let mut dest = [0u8; 6];
        delivery.render(&mut dest).unwrap();
        assert_eq!(&dest[4..], &300i16.to_ne_bytes());
    }

    #[test]
    fn mismatched_destination_is_transient() {
        let data = [0i16; 4];
        let mut delivery = CpalDelivery {
            data: &data,
            channels: 2,
            ticks: 0,
        };
        let mut dest = [0u8; 6];
        assert_eq!(delivery.render(&mut dest), Err(RenderError::transient(status::BUFFER_SIZE)));
    }

    #[test]
    fn unopened_backend_refuses_start() {
        let mut input = CpalInput::default_device();
        assert!(!input.is_open());
        assert_eq!(input.start().unwrap_err().status_code(), Some(status::NOT_OPEN));
    }
}
