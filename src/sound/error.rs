//! Error type for sound construction and decoding
//!
//! Mixer control calls (`play`, `stop`, setters) never fail; these errors
//! only surface when building sounds or streams from external data.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Ogg Vorbis error: {0}")]
    Vorbis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AudioError>;
