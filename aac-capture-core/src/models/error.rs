use thiserror::Error;

/// Errors that can occur while capturing or encoding audio.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Component discovery, instantiation, format negotiation, start/stop or
    /// render failure. Carries the native status code.
    #[error("device error {code}: {context}")]
    Device { code: i32, context: String },

    /// Converter creation, bitrate configuration or per-frame encode failure.
    #[error("encode error: {0}")]
    Encode(String),

    /// Scratch buffer could not be obtained; the affected data is dropped.
    #[error("allocation error: {0}")]
    Allocation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CaptureError {
    pub fn device(code: i32, context: impl Into<String>) -> Self {
        Self::Device {
            code,
            context: context.into(),
        }
    }

    /// Native status code for device errors.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Self::Device { code, .. } => Some(*code),
            _ => None,
        }
    }
}
