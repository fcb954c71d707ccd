//! Sound resources and playback
//!
//! # Architecture
//!
//! - `Sound` holds PCM data or a factory for decoder streams
//! - `SoundStream` is the pull interface for streamed audio
//! - `BufferedSoundStream` queues pushed buffers for a source to pull
//! - `ogg` decodes Ogg Vorbis sounds on demand
//! - `mixer` plays sounds and streams through sound sources

pub mod buffer;
pub mod buffered;
pub mod error;
pub mod formats;
pub mod mixer;
pub mod ogg;
pub mod stream;

pub use buffer::Sound;
pub use buffered::BufferedSoundStream;
pub use error::{AudioError, Result};
pub use formats::AudioFormat;
pub use ogg::{OggVorbisData, OggVorbisStream};
pub use stream::{SoundStream, StreamFactory, StreamFormat};
