//! # aac-capture-native
//!
//! Native collaborators for aac-capture-core.
//!
//! Provides (each behind a cargo feature):
//! - `CpalInput` (`cpal`): hardware input backend via the platform's default cpal host
//! - `FdkAacEncoder` / `FdkEncoderFactory` (`fdk`): AAC-LC block encoder via libfdk-aac
//!
//! With no features enabled the crate is empty.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use aac_capture_core::{CapturePipeline, SessionConfiguration};
//! use aac_capture_native::{CpalInput, FdkEncoderFactory};
//!
//! let pipeline = CapturePipeline::new(
//!     CpalInput::default_device(),
//!     Arc::new(FdkEncoderFactory),
//!     SessionConfiguration::default(),
//! )?;
//! pipeline.set_delegate(delegate);
//! pipeline.start()?;
//! ```

#[cfg(feature = "cpal")]
pub mod cpal_input;
#[cfg(feature = "fdk")]
pub mod fdk_encoder;

#[cfg(feature = "cpal")]
pub use cpal_input::CpalInput;
#[cfg(feature = "fdk")]
pub use fdk_encoder::{FdkAacEncoder, FdkEncoderFactory};
