//! # aac-capture-core
//!
//! Platform-agnostic live AAC capture core library.
//!
//! Turns hardware PCM deliveries into timestamped, ADTS-framed AAC packets.
//! Platform-specific pieces (the hardware input backend and the block AAC
//! encoder) implement the `InputBackend` and `BlockEncoder` traits and plug
//! into the generic `CapturePipeline`.
//!
//! ## Architecture
//!
//! ```text
//! aac-capture-core (this crate)
//! ├── traits/       ← InputBackend, BlockEncoder, EncoderFactory, PipelineDelegate
//! ├── models/       ← CaptureError, LifecycleState, SessionConfiguration, PcmChunk, AacPacket
//! ├── processing/   ← ADTS header synthesis/parsing, FrameAccumulator, Timebase
//! ├── session/      ← CaptureDriver, EncoderDriver, CapturePipeline, CallbackDispatcher
//! └── storage/      ← AdtsFileWriter, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_format::AudioFormat;
pub use models::config::{FrameFailurePolicy, PacketDelivery, SessionConfiguration};
pub use models::error::CaptureError;
pub use models::media::{AacPacket, MediaTime, PacketTiming, PcmChunk};
pub use models::state::LifecycleState;
pub use processing::adts::{AdtsError, AdtsFields};
pub use processing::frame_accumulator::FrameAccumulator;
pub use processing::timestamp::Timebase;
pub use session::capture_driver::CaptureDriver;
pub use session::encoder_driver::{EncoderDriver, EncoderOptions};
pub use session::pipeline::{CapturePipeline, PipelineDiagnostics};
pub use storage::adts_writer::{AdtsFileWriter, AdtsStreamWriter, StreamSummary};
pub use storage::metadata::StreamMetadata;
pub use traits::block_encoder::{BlockEncoder, EncoderFactory, EncoderSettings};
pub use traits::input_backend::{DeliveryCallback, InputBackend, InputDelivery, RenderError};
pub use traits::pipeline_delegate::PipelineDelegate;
