pub mod audio_format;
pub mod config;
pub mod error;
pub mod media;
pub mod state;
